//! On-disk layout: sharded object paths and escaped ref paths.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use chasm_types::Digest;

pub(crate) const OBJECTS_DIR: &str = "objects";
pub(crate) const REFS_DIR: &str = "refs";
pub(crate) const REF_SUFFIX: &str = ".commit";
pub(crate) const METADATA_SUFFIX: &str = ".metadata";

// Everything a filesystem could mistake for structure, plus '%' itself so
// unescaping is unambiguous.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'/')
    .add(b'\\')
    .add(b'?')
    .add(b'#')
    .add(b':')
    .add(b'*')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|');

/// Escape one path segment (a namespace or branch name).
pub(crate) fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Reverse [`escape_segment`]. Returns `None` for undecodable input.
pub(crate) fn unescape_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// The sharded path of an object: `<root>/objects/<prefix>/<remainder>`.
pub(crate) fn object_path(root: &Path, digest: &Digest, prefix_len: usize) -> PathBuf {
    let (prefix, remainder) = digest.split(prefix_len);
    root.join(OBJECTS_DIR).join(prefix).join(remainder)
}

/// The sidecar path next to an object.
pub(crate) fn metadata_path(object_path: &Path) -> PathBuf {
    let mut os: OsString = object_path.as_os_str().to_owned();
    os.push(METADATA_SUFFIX);
    PathBuf::from(os)
}

/// The ref file for a branch: `<root>/refs/<ns>/<branch>.commit`.
pub(crate) fn ref_path(root: &Path, namespace: &str, branch: &str) -> PathBuf {
    let mut file = escape_segment(branch);
    file.push_str(REF_SUFFIX);
    root.join(REFS_DIR).join(escape_segment(namespace)).join(file)
}

/// The directory holding one namespace's refs.
pub(crate) fn namespace_dir(root: &Path, namespace: &str) -> PathBuf {
    root.join(REFS_DIR).join(escape_segment(namespace))
}
