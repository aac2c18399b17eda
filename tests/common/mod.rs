use std::sync::{LazyLock, Mutex};

use dynconn::rbtree::Augment;
use flexi_logger::{Logger, LoggerHandle};
use scopeguard::{OnUnwind, ScopeGuard};

/// Plain sum aggregate for exercising the tree layer.
#[allow(dead_code)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggSum(pub i64);

impl Augment for AggSum {
    type Item = i64;
    type Ctx = ();

    fn identity() -> Self {
        Self(0)
    }

    fn from_item(item: &i64) -> Self {
        Self(*item)
    }

    fn merge(self, _: &(), right: Self) -> Self {
        Self(self.0 + right.0)
    }

    fn changed_from(&self, prev: &Self) -> bool {
        self != prev
    }
}

/// Digit concatenation: deliberately non-commutative, so any mix-up in
/// the in-order merge shows immediately.
#[allow(dead_code)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggCat {
    pub value: i64,
    pub digits: u32,
}

impl Augment for AggCat {
    type Item = i64;
    type Ctx = ();

    fn identity() -> Self {
        Self::default()
    }

    fn from_item(item: &i64) -> Self {
        Self {
            value: *item,
            digits: 1,
        }
    }

    fn merge(self, _: &(), right: Self) -> Self {
        Self {
            value: self.value * 10i64.pow(right.digits) + right.value,
            digits: self.digits + right.digits,
        }
    }

    fn changed_from(&self, prev: &Self) -> bool {
        self != prev
    }
}

#[allow(dead_code)]
pub static LOGGER: LazyLock<Mutex<LoggerHandle>> = LazyLock::new(|| {
    Mutex::new(
        Logger::try_with_env_or_str("info")
            .unwrap()
            .write_mode(flexi_logger::WriteMode::SupportCapture)
            .log_to_stdout()
            .format(|w, now, record| {
                let style = flexi_logger::style(record.level());
                write!(
                    w,
                    "{} {pref}[{}] {}{suf}",
                    now.format("%H:%M:%S"),
                    &record.level().as_str()[0..1],
                    record.args(),
                    pref = style.prefix(),
                    suf = style.suffix(),
                )
            })
            .start()
            .unwrap(),
    )
});

#[allow(dead_code)]
pub fn init_logger() {
    let _ = &*LOGGER;
}

/// Dump the structure when a test panics mid-operation.
#[allow(dead_code)]
pub fn guard<L: std::fmt::Debug>(l: L) -> ScopeGuard<L, impl FnOnce(L), OnUnwind> {
    scopeguard::guard_on_unwind(l, |l| log::error!("Crash with {l:?}"))
}
