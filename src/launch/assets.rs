//! Static files compiled into the binary and shared by every shell session.

use anyhow::Result;
use include_dir::{include_dir, Dir};

static EMBEDDED_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

pub const SSHD_CONFIG_ASSET: &str = "sshd_config";
pub const SHELL_ENTRYPOINT_ASSET: &str = "shell-entrypoint.sh";

/// Read-only asset table, resolved once at startup so that launches never
/// touch the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct Assets {
    pub sshd_config: &'static [u8],
    pub shell_entrypoint: &'static [u8],
}

impl Assets {
    pub fn load() -> Result<Self> {
        Ok(Self {
            sshd_config: get_asset(SSHD_CONFIG_ASSET)?,
            shell_entrypoint: get_asset(SHELL_ENTRYPOINT_ASSET)?,
        })
    }
}

pub fn get_asset(name: &str) -> Result<&'static [u8]> {
    EMBEDDED_ASSETS
        .get_file(name)
        .map(|f| f.contents())
        .ok_or_else(|| anyhow::anyhow!("embedded asset not found: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_assets_are_embedded() {
        let assets = Assets::load().unwrap();
        let sshd = std::str::from_utf8(assets.sshd_config).unwrap();
        assert!(sshd.contains("HostKey /run/determined/ssh/id_rsa"));
        assert!(assets.shell_entrypoint.starts_with(b"#!"));
    }

    #[test]
    fn unknown_asset_is_an_error() {
        assert!(get_asset("no-such-file").is_err());
    }
}
