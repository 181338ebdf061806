//! Linux listener lookup through `/proc/net/tcp{,6}` and `/proc/*/fd`.

use std::collections::HashSet;
use std::fs;
use std::io;

use super::ListenerSource;

/// `st` column value for `TCP_LISTEN`.
const TCP_LISTEN: &str = "0A";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsListeners;

impl ListenerSource for ProcfsListeners {
    fn listening_pids(&self, port: u16) -> io::Result<Vec<u32>> {
        let mut inodes = HashSet::new();
        for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
            match fs::read_to_string(table) {
                Ok(content) => inodes.extend(parse_listen_inodes(&content, port)),
                // tcp6 is absent when IPv6 is disabled
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        if inodes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(pids_holding_sockets(&inodes))
    }
}

/// Socket inodes in LISTEN state on `port`.
///
/// Line shape: `sl local_address rem_address st tx:rx tr:when retrnsmt uid timeout inode ...`
/// with `local_address` as `HEXADDR:HEXPORT`.
pub(crate) fn parse_listen_inodes(table: &str, port: u16) -> Vec<u64> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                return None;
            }
            let (_, hex_port) = fields[1].rsplit_once(':')?;
            if u16::from_str_radix(hex_port, 16).ok()? != port {
                return None;
            }
            fields[9].parse::<u64>().ok().filter(|inode| *inode != 0)
        })
        .collect()
}

/// Walk `/proc/<pid>/fd` looking for `socket:[inode]` links.
///
/// Processes we may not inspect are skipped silently.
fn pids_holding_sockets(inodes: &HashSet<u64>) -> Vec<u32> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut pids = Vec::new();
    for entry in entries.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };

        let holds = fds.flatten().any(|fd| {
            fs::read_link(fd.path())
                .ok()
                .and_then(|target| socket_inode(&target.to_string_lossy()))
                .is_some_and(|inode| inodes.contains(&inode))
        });
        if holds {
            pids.push(pid);
        }
    }
    pids
}

fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}
