use rand::Rng;

use crate::{
    config::Config,
    packet::{Category, Classification},
};

// ==========================================
// 窗口策略：分类 → 基础窗口值 (+ 抖动)
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRule {
    pub enabled: bool,
    pub window: u16,
    pub jitter: u16,
}

#[derive(Debug, Clone)]
pub struct WindowPolicy {
    rules: [WindowRule; 4],
    randomize: bool,
}

impl WindowPolicy {
    pub fn new(rules: [WindowRule; 4], randomize: bool) -> Self {
        Self { rules, randomize }
    }

    pub fn from_config(config: &Config) -> Self {
        let rules = Category::ALL.map(|c| {
            let entry = config.category(c);
            WindowRule {
                enabled: entry.enabled,
                window: entry.window,
                jitter: entry.jitter,
            }
        });
        Self::new(rules, config.randomize)
    }

    pub fn rule(&self, category: Category) -> &WindowRule {
        &self.rules[category.index()]
    }

    /// Base window for the class, `None` when the packet must pass unmodified.
    pub fn resolve(&self, class: Classification) -> Option<u16> {
        let rule = self.rule(class.category()?);
        rule.enabled.then_some(rule.window)
    }

    /// `resolve` followed by jitter when randomization is on.
    pub fn select<R: Rng + ?Sized>(&self, class: Classification, rng: &mut R) -> Option<u16> {
        let window = self.resolve(class)?;
        if !self.randomize {
            return Some(window);
        }
        let jitter = class.category().map_or(0, |c| self.rule(c).jitter);
        Some(apply_jitter(window, jitter, rng))
    }
}

/// Uniform draw from `[window - half_width, window + half_width]`, clipped to u16.
pub fn apply_jitter<R: Rng + ?Sized>(window: u16, half_width: u16, rng: &mut R) -> u16 {
    if half_width == 0 {
        return window;
    }
    let lo = window.saturating_sub(half_width);
    let hi = window.saturating_add(half_width);
    rng.gen_range(lo..=hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    fn policy(randomize: bool) -> WindowPolicy {
        let on = WindowRule {
            enabled: true,
            window: 5,
            jitter: 2,
        };
        let off = WindowRule {
            enabled: false,
            ..on
        };
        WindowPolicy::new([on, on, off, on], randomize)
    }

    #[test]
    fn zero_jitter_returns_window() {
        let mut rng = StdRng::seed_from_u64(1);
        for w in [0u16, 1, 5, 1000, u16::MAX] {
            assert_eq!(apply_jitter(w, 0, &mut rng), w);
        }
    }

    #[test]
    fn jitter_stays_within_clipped_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let cases = [(0u16, 3u16), (2, 5), (100, 10), (65534, 4), (u16::MAX, u16::MAX)];
        for (w, hw) in cases {
            let lo = w.saturating_sub(hw);
            let hi = w.saturating_add(hw);
            for _ in 0..500 {
                let v = apply_jitter(w, hw, &mut rng);
                assert!(v >= lo && v <= hi, "{v} outside [{lo}, {hi}] for w={w} hw={hw}");
            }
        }
    }

    #[test]
    fn jitter_reaches_both_ends() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<u16> = (0..1000).map(|_| apply_jitter(5, 2, &mut rng)).collect();
        assert_eq!(seen, HashSet::from([3, 4, 5, 6, 7]));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        let xs: Vec<u16> = (0..32).map(|_| apply_jitter(500, 100, &mut a)).collect();
        let ys: Vec<u16> = (0..32).map(|_| apply_jitter(500, 100, &mut b)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn resolve_respects_enabled_and_unmatched() {
        let p = policy(true);
        assert_eq!(p.resolve(Classification::Matched(Category::SynAck)), Some(5));
        assert_eq!(p.resolve(Classification::Matched(Category::PshAck)), None);
        assert_eq!(p.resolve(Classification::Unmatched), None);
    }

    #[test]
    fn select_without_randomize_is_exact() {
        let p = policy(false);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(p.select(Classification::Matched(Category::SynAck), &mut rng), Some(5));
        }
    }

    #[test]
    fn select_with_randomize_jitters() {
        let p = policy(true);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let w = p.select(Classification::Matched(Category::FinAck), &mut rng).unwrap();
            assert!((3..=7).contains(&w));
        }
    }
}
