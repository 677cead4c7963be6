use std::{cell::RefCell, ffi::OsStr};

/// What to do with a mnemonic the simulator does not implement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpcodePolicy {
    /// Refuse to load the program.
    #[default]
    Strict,
    /// Load it as a no-op, which only advances the program counter.
    Permissive,
}

/// Compatibility switches for loading and executing programs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub unknown_opcodes: OpcodePolicy,
    /// Make `x0` read as zero and discard writes to it.
    pub hardwire_zero: bool,
    /// Sign-extend `lw`, `lh` and `lb`. Otherwise they zero-extend, like their `u` variants.
    pub sign_extend_loads: bool,
}

#[derive(Clone, Copy)]
struct Env {
    permissive: bool,
    hardwire_zero: bool,
    sign_extend: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        permissive: var_is("RV64SIM_PERMISSIVE", "1"),
        hardwire_zero: var_is("RV64SIM_HARDWIRE_ZERO", "1"),
        sign_extend: var_is("RV64SIM_SIGN_EXTEND", "1"),
    };
    set_env(value);
}

/// Options requested through the environment.
pub fn options() -> Options {
    with_env(|env| Options {
        unknown_opcodes: if env.permissive {
            OpcodePolicy::Permissive
        } else {
            OpcodePolicy::Strict
        },
        hardwire_zero: env.hardwire_zero,
        sign_extend_loads: env.sign_extend,
    })
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
