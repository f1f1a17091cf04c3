use std::fmt;

use etherparse::TcpHeader;

// ==========================================
// TCP 标志位分类器
// 固定优先级：SynAck → PureAck → PshAck → FinAck
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SynAck,
    PureAck,
    PshAck,
    FinAck,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::SynAck,
        Category::PureAck,
        Category::PshAck,
        Category::FinAck,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::SynAck => 0,
            Category::PureAck => 1,
            Category::PshAck => 2,
            Category::FinAck => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::SynAck => "syn-ack",
            Category::PureAck => "ack",
            Category::PshAck => "psh-ack",
            Category::FinAck => "fin-ack",
        }
    }

    /// Flag pattern matched by `--tcp-flags SYN,RST,ACK,FIN,PSH <pattern>`.
    pub fn tcp_flags_pattern(self) -> &'static str {
        match self {
            Category::SynAck => "SYN,ACK",
            Category::PureAck => "ACK",
            Category::PshAck => "PSH,ACK",
            Category::FinAck => "FIN,ACK",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Matched(Category),
    Unmatched,
}

impl Classification {
    pub fn category(self) -> Option<Category> {
        match self {
            Classification::Matched(c) => Some(c),
            Classification::Unmatched => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
}

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;

    /// 从 TCP 头第 13 字节解析（只关心低 5 位）
    pub fn from_bits(bits: u8) -> Self {
        Self {
            fin: bits & Self::FIN != 0,
            syn: bits & Self::SYN != 0,
            rst: bits & Self::RST != 0,
            psh: bits & Self::PSH != 0,
            ack: bits & Self::ACK != 0,
        }
    }

    pub fn classify(self) -> Classification {
        if self.syn && self.ack {
            return Classification::Matched(Category::SynAck);
        }
        // 纯 ACK：只有 ACK，其余控制位全清
        if self.ack && !self.syn && !self.fin && !self.psh && !self.rst {
            return Classification::Matched(Category::PureAck);
        }
        if self.psh && self.ack {
            return Classification::Matched(Category::PshAck);
        }
        if self.fin && self.ack {
            return Classification::Matched(Category::FinAck);
        }
        Classification::Unmatched
    }
}

impl From<&TcpHeader> for TcpFlags {
    fn from(tcp: &TcpHeader) -> Self {
        Self {
            fin: tcp.fin,
            syn: tcp.syn,
            rst: tcp.rst,
            psh: tcp.psh,
            ack: tcp.ack,
        }
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.syn, "SYN"),
            (self.fin, "FIN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.ack, "ACK"),
        ];
        let set: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        if set.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&set.join(","))
        }
    }
}
