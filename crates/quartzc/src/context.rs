//! The frontend runtime configuration: flag bits, version descriptor,
//! and the input/output file queues. Printed verbatim by
//! `--dump-context`.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use quartz_common::files::{FileQueue, OutputFile};

/// Driver flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(pub u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const VERBOSE: Flags = Flags(1);
    pub const COLOURS: Flags = Flags(1 << 1);
    pub const DUMP_IR: Flags = Flags(1 << 2);
    pub const DUMP_AST: Flags = Flags(1 << 3);
    pub const DUMP_ENTS: Flags = Flags(1 << 4);
    pub const DUMP_TOKS: Flags = Flags(1 << 5);
    pub const DUMP_CTX: Flags = Flags(1 << 6);

    pub fn set(&mut self, flag: Flags) {
        self.0 |= flag.0;
    }

    pub fn has(self, flag: Flags) -> bool {
        self.0 & flag.0 != 0
    }

    fn names(self) -> Vec<&'static str> {
        const TABLE: &[(Flags, &str)] = &[
            (Flags::VERBOSE, "Verbose"),
            (Flags::COLOURS, "Colours"),
            (Flags::DUMP_IR, "DumpIR"),
            (Flags::DUMP_AST, "DumpAST"),
            (Flags::DUMP_ENTS, "DumpEnts"),
            (Flags::DUMP_TOKS, "DumpToks"),
            (Flags::DUMP_CTX, "DumpCtx"),
        ];
        TABLE
            .iter()
            .filter(|(f, _)| self.has(*f))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Serialize for Flags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

/// Compiler version and target descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    /// Target architecture, e.g. x86_64.
    pub arch: String,
    /// Target operating system.
    pub os: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        let mut parts = env!("CARGO_PKG_VERSION").split('.');
        let mut next = || parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Self {
            major: next(),
            minor: next(),
            patch: next(),
            arch: std::env::consts::ARCH.to_string(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// The driver-side frontend context.
#[derive(Debug, Serialize)]
pub struct Context {
    pub flags: Flags,
    pub version: VersionInfo,
    pub inputs: FileQueue,
    pub outputs: Vec<OutputFile>,
}

impl Context {
    pub fn dump(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).expect("context is serializable");
        writeln!(out, "{json}")
    }
}
