use serde::Serialize;

/// What the activation service learns about this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
    pub os: String,
    pub ip: String,
    pub metadata: DeviceMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    pub app_version: String,
    pub language: String,
}

const DEFAULT_LANGUAGE: &str = "zh-CN";

impl DeviceInfo {
    pub fn current() -> Self {
        let os = os_label(std::env::consts::OS);
        let home = dirs::home_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let fingerprint = format!("{}-{}-{}", os, std::env::consts::ARCH, home);

        Self {
            device_id: device_id(&fingerprint),
            device_name: format!("{os} Device"),
            os,
            ip: "127.0.0.1".to_string(),
            metadata: DeviceMetadata {
                app_version: env!("CARGO_PKG_VERSION").to_string(),
                language: std::env::var("LANG")
                    .ok()
                    .and_then(|lang| locale_to_language(&lang))
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            },
        }
    }
}

/// `DEVICE-<HEX>` from a 32-bit rolling hash of the fingerprint.
pub fn device_id(fingerprint: &str) -> String {
    let hash = fingerprint
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        });
    format!("DEVICE-{:X}", hash.unsigned_abs())
}

fn os_label(os: &str) -> String {
    match os {
        "macos" => "macOS".to_string(),
        "windows" => "Windows".to_string(),
        "linux" => "Linux".to_string(),
        other => other.to_string(),
    }
}

/// `en_US.UTF-8` -> `en-US`. `C` and `POSIX` carry no language.
fn locale_to_language(locale: &str) -> Option<String> {
    let tag = locale.split(['.', '@']).next()?.trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_is_stable_and_prefixed() {
        let a = device_id("macOS-aarch64-/Users/ada");
        let b = device_id("macOS-aarch64-/Users/ada");
        assert_eq!(a, b);
        assert!(a.starts_with("DEVICE-"));
        assert!(a["DEVICE-".len()..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(a, device_id("Linux-x86_64-/home/ada"));
    }

    #[test]
    fn device_id_matches_known_hash() {
        // 'a' = 97
        assert_eq!(device_id("a"), "DEVICE-61");
        // 97 * 31 + 98 = 3105
        assert_eq!(device_id("ab"), "DEVICE-C21");
        assert_eq!(device_id(""), "DEVICE-0");
    }

    #[test]
    fn locale_parsing() {
        assert_eq!(locale_to_language("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(locale_to_language("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(locale_to_language("C"), None);
        assert_eq!(locale_to_language(""), None);
    }

    #[test]
    fn current_device_names_the_os() {
        let info = DeviceInfo::current();
        assert!(info.device_name.ends_with(" Device"));
        assert!(info.device_id.starts_with("DEVICE-"));
        assert_eq!(info.metadata.app_version, env!("CARGO_PKG_VERSION"));
    }
}
