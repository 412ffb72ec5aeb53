use std::io;
use tar::{EntryType, Header};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
}

/// One file or directory injected into a task container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub content: Vec<u8>,
    pub mode: u32,
    pub kind: EntryKind,
    pub uid: u32,
    pub gid: u32,
    pub user_name: String,
    pub group_name: String,
}

/// Ordered set of entries, written into the container in sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn new(entries: Vec<ArchiveEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Serialize as a tar stream rooted at `/`. Absolute paths lose their
    /// leading slash; tar member names must be relative.
    pub fn to_tar(&self, mtime: u64) -> io::Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());

        for entry in &self.entries {
            let mut header = Header::new_gnu();
            let name = entry.path.trim_start_matches('/');
            match entry.kind {
                EntryKind::Directory => {
                    header.set_entry_type(EntryType::Directory);
                    header.set_path(format!("{}/", name.trim_end_matches('/')))?;
                    header.set_size(0);
                }
                EntryKind::Regular => {
                    header.set_entry_type(EntryType::Regular);
                    header.set_path(name)?;
                    header.set_size(entry.content.len() as u64);
                }
            }
            header.set_mode(entry.mode);
            header.set_uid(u64::from(entry.uid));
            header.set_gid(u64::from(entry.gid));
            header.set_username(&entry.user_name)?;
            header.set_groupname(&entry.group_name)?;
            header.set_mtime(mtime);
            header.set_cksum();

            let data: &[u8] = match entry.kind {
                EntryKind::Directory => &[],
                EntryKind::Regular => &entry.content,
            };
            builder.append(&header, data)?;
        }

        builder.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::Path;

    fn entry(path: &str, content: &[u8], mode: u32, kind: EntryKind) -> ArchiveEntry {
        ArchiveEntry {
            path: path.to_string(),
            content: content.to_vec(),
            mode,
            kind,
            uid: 1001,
            gid: 50,
            user_name: "alice".to_string(),
            group_name: "staff".to_string(),
        }
    }

    #[test]
    fn tar_stream_keeps_order_modes_and_ownership() {
        let archive = Archive::new(vec![
            entry("/run/app", b"", 0o700, EntryKind::Directory),
            entry("/run/app/key", b"secret", 0o600, EntryKind::Regular),
        ]);

        let bytes = archive.to_tar(1_700_000_000).unwrap();
        let mut reader = tar::Archive::new(bytes.as_slice());
        let mut members = reader.entries().unwrap();

        let dir = members.next().unwrap().unwrap();
        assert_eq!(dir.path().unwrap(), Path::new("run/app"));
        assert_eq!(dir.header().entry_type(), EntryType::Directory);
        assert_eq!(dir.header().mode().unwrap(), 0o700);

        let mut file = members.next().unwrap().unwrap();
        assert_eq!(file.path().unwrap(), Path::new("run/app/key"));
        assert_eq!(file.header().mode().unwrap(), 0o600);
        assert_eq!(file.header().uid().unwrap(), 1001);
        assert_eq!(file.header().gid().unwrap(), 50);
        assert_eq!(file.header().username().unwrap(), Some("alice"));
        assert_eq!(file.header().groupname().unwrap(), Some("staff"));
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "secret");

        assert!(members.next().is_none());
    }

    #[test]
    fn parent_directory_components_are_rejected() {
        let archive = Archive::new(vec![entry("../escape", b"x", 0o644, EntryKind::Regular)]);
        assert!(archive.to_tar(0).is_err());
    }
}
