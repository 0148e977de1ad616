//! Fake collaborators and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use fleet_collector::archive::FreeSpace;
use fleet_collector::transport::{CommandOutput, ExecRequest, RemoteCommand, RemoteExec, Shell, SyncRequest};

pub const INVENTORY: &str = r#"[
    {"id": 1, "roles": ["controller", "mongo"], "ip": "10.20.0.3", "cluster": 1,
     "mac": "aa:01", "os_platform": "ubuntu", "status": "ready", "online": true},
    {"id": 2, "roles": "controller", "ip": "10.20.0.4", "cluster": 1,
     "mac": "aa:02", "os_platform": "ubuntu", "status": "ready", "online": true},
    {"id": 3, "roles": "controller", "ip": "10.20.0.5", "cluster": 1,
     "mac": "aa:03", "os_platform": "ubuntu", "status": "ready", "online": true},
    {"id": 4, "roles": ["compute"], "ip": "10.20.0.6", "cluster": 1,
     "mac": "aa:04", "os_platform": "centos", "status": "ready", "online": true},
    {"id": 5, "roles": ["compute"], "ip": "10.20.0.7", "cluster": 2,
     "mac": "aa:05", "os_platform": "debian", "status": "ready", "online": true},
    {"id": 6, "roles": ["compute"], "ip": "10.20.0.8", "cluster": 1,
     "mac": "aa:06", "os_platform": "ubuntu", "status": "error", "online": true}
]"#;

/// Write `(relative path, content)` pairs under `root`
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// A data-source bundle covering every layer
pub fn write_data_source_tree(root: &Path) {
    write_files(
        root,
        &[
            ("cmds/by-role/controller/ovs-vsctl", "ovs-vsctl show\n"),
            ("cmds/by-role/compute/virsh-list", "virsh list --all\n"),
            ("cmds/release-9.0/controller/nova-manage", "nova-manage service list\n"),
            ("cmds/by-os/ubuntu/dpkg-list", "dpkg -l\n"),
            ("cmds/by-os/centos/rpm-list", "rpm -qa\n"),
            ("cmds/by-os/debian/dpkg-list", "dpkg -l\n"),
            ("cmds/default/default/uptime", "uptime\n"),
            ("cmds/default/default/.debian-only-check", "cat /etc/debian_version\n"),
            ("cmds/once-by-role/controller/cluster-status", "crm status\n"),
            ("cmds/once-by-role/mongo/replica-status", "mongo --eval 'rs.status()'\n"),
            ("files/default/default/etc", "# base config\n/etc/hosts\n/etc/resolv.conf\n"),
            ("files/by-role/compute/nova", "/etc/nova\n"),
            ("logs/by-role/controller/keystone", "/var/log/keystone\n"),
        ],
    );
}

/// Remote side of the fleet: answers the orchestrator queries, `du` and
/// `find`, writes a fake archive for `tar`, and records every call.
pub struct FakeFleet {
    pub inventory: String,
    pub log_inventory: String,
    pub timeout_addresses: Vec<String>,
    pub execs: Mutex<Vec<ExecRequest>>,
    pub syncs: Mutex<Vec<SyncRequest>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self {
            inventory: INVENTORY.to_string(),
            log_inventory: "2048\t/var/log/nova/nova-api.log\n1024\t/var/log/nova/nova-debug.log\n512\t/var/log/messages\n"
                .to_string(),
            timeout_addresses: Vec::new(),
            execs: Mutex::new(Vec::new()),
            syncs: Mutex::new(Vec::new()),
        }
    }

    pub fn exec_count(&self, predicate: impl Fn(&ExecRequest) -> bool) -> usize {
        self.execs.lock().unwrap().iter().filter(|r| predicate(r)).count()
    }
}

impl RemoteExec for FakeFleet {
    fn exec(&self, request: &ExecRequest) -> CommandOutput {
        self.execs.lock().unwrap().push(request.clone());
        if self.timeout_addresses.contains(&request.address) {
            return CommandOutput::timed_out("timed out");
        }
        let output = match &request.command {
            RemoteCommand::Script(_) => CommandOutput::success("ok\n"),
            RemoteCommand::Inline(cmd) if cmd.contains("version.yaml") => CommandOutput::success(" \"9.0\"\n"),
            RemoteCommand::Inline(cmd) if cmd.contains("astute.yaml") => CommandOutput::success("9.0\n"),
            RemoteCommand::Inline(cmd) if cmd.contains("node list") => CommandOutput::success(self.inventory.clone()),
            RemoteCommand::Inline(cmd) if cmd.starts_with("find") => CommandOutput::success(self.log_inventory.clone()),
            RemoteCommand::Inline(cmd) if cmd.starts_with("du -b") => CommandOutput::success("4096\t/var/log/keystone\n"),
            RemoteCommand::Inline(cmd) if cmd.starts_with("tar") => CommandOutput::success(""),
            RemoteCommand::Inline(cmd) => CommandOutput::failure(127, format!("unknown command: {}", cmd)),
        };
        if let Some(path) = &request.output {
            fs::write(path, &output.stdout).unwrap();
        }
        output
    }

    fn sync(&self, request: &SyncRequest) -> CommandOutput {
        self.syncs.lock().unwrap().push(request.clone());
        CommandOutput::success("")
    }
}

/// Local shell recording commands; every command succeeds
#[derive(Default)]
pub struct RecordingShell {
    pub commands: Mutex<Vec<String>>,
}

impl Shell for RecordingShell {
    fn run(&self, command: &str, _timeout: std::time::Duration) -> CommandOutput {
        self.commands.lock().unwrap().push(command.to_string());
        CommandOutput::success("")
    }
}

/// Fixed amount of free space
pub struct FixedSpace(pub u64);

impl FreeSpace for FixedSpace {
    fn free_kilobytes(&self, _path: &Path) -> Result<u64> {
        Ok(self.0)
    }
}
