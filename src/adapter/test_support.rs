//! アダプターのユニットテスト用の補助

use std::env;
use std::sync::{Mutex, MutexGuard};

// 環境変数はプロセス全体で共有されるため、触るテストはこのロックで直列化する
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// 環境変数を扱うテストのガード
/// 作成時と破棄時に対象の変数を消す
pub(crate) struct EnvGuard {
    vars: &'static [&'static str],
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn new(vars: &'static [&'static str]) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let guard = Self { vars, _lock: lock };
        guard.clear();
        guard
    }

    pub(crate) fn set(&self, name: &str, value: &str) {
        env::set_var(name, value);
    }

    fn clear(&self) {
        for var in self.vars {
            env::remove_var(var);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        self.clear();
    }
}
