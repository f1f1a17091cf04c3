use std::time::Instant;

#[derive(Debug)]
pub struct PacketContext<T> {
    pub msg: T,            // 内核交过来的包，判决前归 worker 独占
    pub queue_num: u16,    // 从哪个队列收的
    pub arrival_time: Instant,
}

impl<T> PacketContext<T> {
    pub fn new(msg: T, queue_num: u16) -> Self {
        Self {
            msg,
            queue_num,
            arrival_time: Instant::now(),
        }
    }
}
