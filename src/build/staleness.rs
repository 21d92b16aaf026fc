//! Whether an object file or precompiled header must be rebuilt.
//!
//! Timestamps decide first; the artifact record settles the rest. An output
//! whose timestamps look fine is still rebuilt when its record is missing,
//! was written before the output, names a different command, or carries a
//! hash that no longer matches the file.

use super::invocation::CompilerInvocation;
use crate::cache::{StoredRecord, hash_file};
use crate::graph::modified_time;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Forced,
    OutputMissing,
    PchNewer,
    PrebuildNewer,
    InputNewer,
    RecordMissing,
    RecordOutdated,
    CommandChanged,
    HashMismatch,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RebuildReason::Forced => "full rebuild requested",
            RebuildReason::OutputMissing => "output does not exist",
            RebuildReason::PchNewer => "precompiled header is newer than output",
            RebuildReason::PrebuildNewer => "a pre-build rule produced newer output",
            RebuildReason::InputNewer => "source or an included header changed",
            RebuildReason::RecordMissing => "no build record",
            RebuildReason::RecordOutdated => "build record is older than output",
            RebuildReason::CommandChanged => "compiler or arguments changed",
            RebuildReason::HashMismatch => "output content does not match its record",
        };
        f.write_str(text)
    }
}

/// Why `invocation` has to run, or `None` if its output can be reused.
///
/// `pch_time` is the modification time of the precompiled header this
/// output depends on, if any. `prebuild_time` is the newest time produced by
/// this build's pre-build rules.
pub fn rebuild_reason(
    invocation: &CompilerInvocation,
    record: Option<&StoredRecord>,
    pch_time: Option<SystemTime>,
    prebuild_time: Option<SystemTime>,
    force: bool,
) -> Option<RebuildReason> {
    if force {
        return Some(RebuildReason::Forced);
    }

    let Some(output_time) = modified_time(&invocation.output) else {
        return Some(RebuildReason::OutputMissing);
    };
    if pch_time.is_some_and(|pch| output_time < pch) {
        return Some(RebuildReason::PchNewer);
    }
    if prebuild_time.is_some_and(|rules| output_time < rules) {
        return Some(RebuildReason::PrebuildNewer);
    }
    if invocation.input_time.is_none_or(|input| output_time < input) {
        return Some(RebuildReason::InputNewer);
    }

    let Some(stored) = record else {
        return Some(RebuildReason::RecordMissing);
    };
    if stored.written < output_time {
        return Some(RebuildReason::RecordOutdated);
    }
    if stored.record.compiler != invocation.compiler_id() || stored.record.args != invocation.args
    {
        return Some(RebuildReason::CommandChanged);
    }
    match hash_file(&invocation.output) {
        Ok(hash) if hash == stored.record.hash => None,
        _ => Some(RebuildReason::HashMismatch),
    }
}

pub fn should_recompile(
    invocation: &CompilerInvocation,
    record: Option<&StoredRecord>,
    pch_time: Option<SystemTime>,
    prebuild_time: Option<SystemTime>,
    force: bool,
) -> bool {
    rebuild_reason(invocation, record, pch_time, prebuild_time, force).is_some()
}
