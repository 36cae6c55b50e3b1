/// Boundary protocol versions this crate can speak, newest first.
const SUPPORTED_VERSIONS: &[&str] = &["0.1.0", "0.0.1"];

/// Ordered set of boundary protocol versions advertised to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryVersions {
    versions: Vec<String>,
}

impl BoundaryVersions {
    /// Versions supported by this build of the binding.
    pub fn current() -> Self {
        Self::from_iter(SUPPORTED_VERSIONS.iter().copied())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.versions
    }

    pub fn newest(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }

    pub fn supports(&self, version: &str) -> bool {
        self.versions.iter().any(|candidate| candidate == version)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.versions
    }
}

impl<S: Into<String>> FromIterator<S> for BoundaryVersions {
    /// Collect versions in order, dropping repeats after their first appearance.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut versions: Vec<String> = Vec::new();
        for version in iter {
            let version = version.into();
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
        Self { versions }
    }
}

impl Default for BoundaryVersions {
    fn default() -> Self {
        Self::current()
    }
}
