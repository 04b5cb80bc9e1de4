use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const STACK: &str = r#"name: lab
config:
  xenorchestra:url: https://xo.lab
machines:
  - name: ubuntu2404
    os: ubuntu
    hostname: pulumi-ubuntu2404
    domain: internal.domain
    pool: XCP-Pool-1
    template: ubuntu-24.04.2-packer-gold
    sr: SR-PROD-1
    cpus: 2
    memory:
      max: 4GiB
    disks:
      - name: disk1
        size: 20GiB
    network:
      name: vlan100/admin
    addressing:
      address: 10.10.20.2/24
      gateway: 10.10.20.254
      nameservers: [10.10.20.200, 1.1.1.1]
    password_key: defaultUbuntuPassword
  - name: win2022
    os: windows
    hostname: pulumi-w2022
    domain: internal.domain
    pool: XCP-Pool-1
    template: windows-server-2022-packer-gold
    sr: SR-PROD-1
    cpus: 4
    memory:
      max: 8GiB
    network:
      name: vlan100/admin
      generate_mac: true
    addressing:
      address: 10.10.20.1/24
      gateway: 10.10.20.254
      nameservers: [10.10.20.200]
    password_key: defaultWindowsPassword
    fix_memory_after_create: true
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// Project with the two sample machines
    pub fn with_stack() -> Self {
        let project = Self::new();
        project.write_stack(STACK);
        project
    }

    pub fn write_stack(&self, content: &str) {
        fs::write(self.stack_path(), content).unwrap();
    }

    pub fn read_stack(&self) -> String {
        fs::read_to_string(self.stack_path()).unwrap()
    }

    pub fn stack_path(&self) -> PathBuf {
        self.root.path().join("xenflow.yaml")
    }

    /// `xenflow` pointed at this project, with no secrets key
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("xenflow").unwrap();
        cmd.current_dir(self.root.path())
            .env("XENFLOW_STACK_PATH", self.stack_path())
            .env("HOME", self.root.path())
            .env("XDG_CONFIG_HOME", self.root.path().join("config"))
            .env_remove("XENFLOW_SECRETS_KEY")
            .env_remove("XENFLOW_MACHINE")
            .env_remove("RUST_LOG");
        cmd
    }
}
