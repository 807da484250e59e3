//! Process signal identifiers.
//!
//! Signals are accepted by number or by name, case-insensitively and with or
//! without the `SIG` prefix: `12`, `usr2`, `SIGUSR2` all name the same signal.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

const NAMED_SIGNALS: &[(&str, libc::c_int)] = &[
    ("HUP", libc::SIGHUP),
    ("INT", libc::SIGINT),
    ("QUIT", libc::SIGQUIT),
    ("ILL", libc::SIGILL),
    ("TRAP", libc::SIGTRAP),
    ("ABRT", libc::SIGABRT),
    ("BUS", libc::SIGBUS),
    ("FPE", libc::SIGFPE),
    ("KILL", libc::SIGKILL),
    ("USR1", libc::SIGUSR1),
    ("SEGV", libc::SIGSEGV),
    ("USR2", libc::SIGUSR2),
    ("PIPE", libc::SIGPIPE),
    ("ALRM", libc::SIGALRM),
    ("TERM", libc::SIGTERM),
    ("CHLD", libc::SIGCHLD),
    ("CONT", libc::SIGCONT),
    ("STOP", libc::SIGSTOP),
    ("TSTP", libc::SIGTSTP),
    ("TTIN", libc::SIGTTIN),
    ("TTOU", libc::SIGTTOU),
    ("URG", libc::SIGURG),
    ("XCPU", libc::SIGXCPU),
    ("XFSZ", libc::SIGXFSZ),
    ("VTALRM", libc::SIGVTALRM),
    ("PROF", libc::SIGPROF),
    ("WINCH", libc::SIGWINCH),
    ("IO", libc::SIGIO),
    ("SYS", libc::SIGSYS),
];

/// A process signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(libc::c_int);

impl Signal {
    pub const HUP: Signal = Signal(libc::SIGHUP);
    pub const USR1: Signal = Signal(libc::SIGUSR1);
    pub const USR2: Signal = Signal(libc::SIGUSR2);
    pub const ALRM: Signal = Signal(libc::SIGALRM);
    pub const WINCH: Signal = Signal(libc::SIGWINCH);

    /// Wrap a raw signal number.
    pub const fn from_raw(number: libc::c_int) -> Self {
        Signal(number)
    }

    pub const fn number(self) -> libc::c_int {
        self.0
    }

    /// Conventional name (`SIGUSR2`), if the number is a known one.
    pub fn name(self) -> Option<String> {
        NAMED_SIGNALS
            .iter()
            .find(|(_, number)| *number == self.0)
            .map(|(name, _)| format!("SIG{}", name))
    }
}

impl Default for Signal {
    fn default() -> Self {
        Signal::USR2
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(&name),
            None => write!(f, "signal {}", self.0),
        }
    }
}

/// Error returned for an unknown signal name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal '{0}'")]
pub struct UnknownSignalError(pub String);

impl FromStr for Signal {
    type Err = UnknownSignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<libc::c_int>() {
            return if number > 0 {
                Ok(Signal(number))
            } else {
                Err(UnknownSignalError(trimmed.to_string()))
            };
        }

        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        NAMED_SIGNALS
            .iter()
            .find(|(name, _)| *name == bare)
            .map(|(_, number)| Signal(*number))
            .ok_or_else(|| UnknownSignalError(trimmed.to_string()))
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(libc::c_int),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => n.to_string().parse().map_err(serde::de::Error::custom),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signal_forms() {
        for form in ["SIGUSR2", "sigusr2", "USR2", "usr2"] {
            assert_eq!(form.parse::<Signal>().unwrap(), Signal::USR2, "{}", form);
        }
        assert_eq!(
            libc::SIGHUP.to_string().parse::<Signal>().unwrap(),
            Signal::HUP
        );
    }

    #[test]
    fn test_parse_signal_errors() {
        assert!("SIGNOPE".parse::<Signal>().is_err());
        assert!("0".parse::<Signal>().is_err());
        assert!("".parse::<Signal>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Signal::USR1.to_string(), "SIGUSR1");
        assert_eq!(Signal::default(), Signal::USR2);
        assert_eq!(Signal::from_raw(200).to_string(), "signal 200");
    }

    #[test]
    fn test_deserialize() {
        let by_name: Signal = serde_json::from_str("\"hup\"").unwrap();
        assert_eq!(by_name, Signal::HUP);
        let by_number: Signal = serde_json::from_str(&libc::SIGALRM.to_string()).unwrap();
        assert_eq!(by_number, Signal::ALRM);
    }
}
