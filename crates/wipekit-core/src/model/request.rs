/// Wipe request description — what to sanitize and how.
///
/// A `WipeRequest` is validated by [`crate::validate`] before any process
/// is spawned; the orchestrator turns it into the engine's argument vector.
use std::sync::atomic::{AtomicU64, Ordering};

/// Overwrite algorithms supported by the securewipe engine.
///
/// The engine owns the actual pattern generation; this layer only selects
/// which algorithm to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeAlgorithm {
    /// Single pass of cryptographically random data.
    Random,
    /// Single pass of zero bytes.
    Zeros,
    /// Single pass of 0xFF bytes.
    Ones,
    /// DoD 5220.22-M style three-pass overwrite.
    Dod3,
    /// Gutmann 35-pass overwrite.
    Gutmann,
}

impl WipeAlgorithm {
    /// Wire selector passed to the engine's `--algorithm` flag.
    pub fn selector(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Zeros => "zeros",
            Self::Ones => "ones",
            Self::Dod3 => "dod3",
            Self::Gutmann => "gutmann",
        }
    }

    /// Number of overwrite passes the algorithm performs by default.
    pub fn default_passes(self) -> u32 {
        match self {
            Self::Random | Self::Zeros | Self::Ones => 1,
            Self::Dod3 => 3,
            Self::Gutmann => 35,
        }
    }

    /// Parse a wire selector back into an algorithm.
    pub fn from_selector(s: &str) -> Option<Self> {
        match s {
            "random" => Some(Self::Random),
            "zeros" => Some(Self::Zeros),
            "ones" => Some(Self::Ones),
            "dod3" => Some(Self::Dod3),
            "gutmann" => Some(Self::Gutmann),
            _ => None,
        }
    }
}

/// A single sanitization request.
#[derive(Debug, Clone)]
pub struct WipeRequest {
    /// Target file or device path. Ignored when `demo` is set.
    pub target: String,
    /// Overwrite algorithm to request from the engine.
    pub algorithm: WipeAlgorithm,
    /// Explicit pass-count override. Only emitted when set; must be 1..=100.
    pub passes: Option<u32>,
    /// I/O buffer size hint in KB. Only emitted when set.
    pub buffer_size_kb: Option<u32>,
    /// Demo mode — wipe a freshly generated temporary file instead of `target`.
    pub demo: bool,
    /// Size of the synthetic demo target in MB.
    pub demo_size_mb: u64,
    /// Ask for privilege elevation if the target turns out to require it.
    pub elevate: bool,
}

impl WipeRequest {
    /// A plain request against `target` with engine defaults for everything else.
    pub fn new(target: impl Into<String>, algorithm: WipeAlgorithm) -> Self {
        Self {
            target: target.into(),
            algorithm,
            passes: None,
            buffer_size_kb: None,
            demo: false,
            demo_size_mb: 0,
            elevate: false,
        }
    }

    /// A demo-mode request. The target path is generated, never caller-supplied.
    pub fn demo(algorithm: WipeAlgorithm, demo_size_mb: u64) -> Self {
        Self {
            target: String::new(),
            algorithm,
            passes: None,
            buffer_size_kb: None,
            demo: true,
            demo_size_mb,
            elevate: false,
        }
    }
}

/// Generate a unique temporary path for a demo-mode target.
///
/// Demo targets are created (and destroyed) by the engine itself; this layer
/// only needs a name that cannot collide with real user data.
pub fn demo_target_path() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("wipekit-demo-{}-{seq}.bin", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_round_trip() {
        for alg in [
            WipeAlgorithm::Random,
            WipeAlgorithm::Zeros,
            WipeAlgorithm::Ones,
            WipeAlgorithm::Dod3,
            WipeAlgorithm::Gutmann,
        ] {
            assert_eq!(WipeAlgorithm::from_selector(alg.selector()), Some(alg));
        }
        assert_eq!(WipeAlgorithm::from_selector("dban"), None);
    }

    #[test]
    fn default_pass_counts() {
        assert_eq!(WipeAlgorithm::Zeros.default_passes(), 1);
        assert_eq!(WipeAlgorithm::Dod3.default_passes(), 3);
        assert_eq!(WipeAlgorithm::Gutmann.default_passes(), 35);
    }

    #[test]
    fn demo_target_paths_are_unique() {
        let a = demo_target_path();
        let b = demo_target_path();
        assert_ne!(a, b);
        assert!(a.contains("wipekit-demo-"));
    }
}
