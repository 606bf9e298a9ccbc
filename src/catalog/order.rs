//! Precedence ordering of Go release names such as `go1.21.0`, `go1.21rc1`
//! or `go1.9beta2`.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:go)?(\d+)(?:\.(\d+))?(?:\.(\d+))?([A-Za-z]*)(\d*)").unwrap()
});

/// Components of a release name. Unparsable names collapse to all zeros.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseName {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Prerelease label (`rc`, `beta`, ...), empty for stable releases.
    pub label: String,
    pub label_number: u64,
}

impl ReleaseName {
    pub fn parse(name: &str) -> Self {
        let Some(caps) = RELEASE_RE.captures(name.trim()) else {
            return Self::default();
        };
        let number = |idx: usize| {
            caps.get(idx)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };

        Self {
            major: number(1),
            minor: number(2),
            patch: number(3),
            label: caps
                .get(4)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default(),
            label_number: number(5),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.label.is_empty()
    }

    /// Compare by precedence: numeric triple, then label rank, then label number.
    pub fn precedence_cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| self.prerelease_cmp(other))
    }

    fn prerelease_cmp(&self, other: &Self) -> Ordering {
        if self.label == other.label {
            return self.label_number.cmp(&other.label_number);
        }
        label_rank(&self.label).cmp(&label_rank(&other.label))
    }
}

fn label_rank(label: &str) -> u8 {
    match label {
        "" => 3,
        "rc" => 2,
        "beta" => 1,
        _ => 0,
    }
}

/// `Ordering::Greater` when `a` takes precedence over `b`.
pub fn compare_release_names(a: &str, b: &str) -> Ordering {
    ReleaseName::parse(a).precedence_cmp(&ReleaseName::parse(b))
}
