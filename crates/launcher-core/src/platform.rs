use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKind {
    Windows,
    Linux,
    Osx,
}

impl OsKind {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsKind::Windows
        } else if cfg!(target_os = "macos") {
            OsKind::Osx
        } else {
            OsKind::Linux
        }
    }

    /// Name used by `os.name` in version metadata rules.
    pub fn key(self) -> &'static str {
        match self {
            OsKind::Windows => "windows",
            OsKind::Linux => "linux",
            OsKind::Osx => "osx",
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The machine the game is installed for and launched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsKind,
    pub os_version: String,
    /// Rust-style CPU name: `x86_64`, `x86`, `aarch64`, `arm`.
    pub arch: String,
}

impl Platform {
    pub fn new(os: OsKind, os_version: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os,
            os_version: os_version.into(),
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        let os_version = sysinfo::System::os_version().unwrap_or_default();
        Self::new(OsKind::current(), os_version, std::env::consts::ARCH)
    }

    pub fn is_arm64(&self) -> bool {
        self.arch == "aarch64"
    }

    pub fn is_arm32(&self) -> bool {
        self.arch == "arm"
    }

    pub fn is_x86(&self) -> bool {
        self.arch == "x86"
    }

    pub fn bits(&self) -> &'static str {
        if self.is_x86() || self.is_arm32() {
            "32"
        } else {
            "64"
        }
    }

    /// Suffix tried after `natives-<os>` when picking a native classifier.
    pub fn native_qualifier(&self) -> &'static str {
        if self.is_arm64() {
            "arm64"
        } else if self.is_arm32() {
            "arm32"
        } else {
            self.bits()
        }
    }

    pub fn classpath_separator(&self) -> &'static str {
        match self.os {
            OsKind::Windows => ";",
            _ => ":",
        }
    }

    pub fn java_executable_name(&self) -> &'static str {
        match self.os {
            OsKind::Windows => "javaw.exe",
            _ => "java",
        }
    }

    /// Platform key of Mojang's Java runtime catalog.
    pub fn runtime_key(&self) -> &'static str {
        match self.os {
            OsKind::Windows if self.is_arm64() => "windows-arm64",
            OsKind::Windows if self.is_x86() => "windows-x86",
            OsKind::Windows => "windows-x64",
            OsKind::Osx if self.is_arm64() => "mac-os-arm64",
            OsKind::Osx => "mac-os",
            OsKind::Linux if self.is_x86() => "linux-i386",
            OsKind::Linux if self.is_arm64() => "linux-arm64",
            OsKind::Linux => "linux",
        }
    }
}
