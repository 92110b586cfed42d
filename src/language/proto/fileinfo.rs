//! Single-file inspection for protobuf sources.

use once_cell::sync::Lazy;
use regex::Regex;

static PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*package\s+([A-Za-z0-9_.]+)\s*;"#).expect("package regex"));
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:public\s+|weak\s+)?"([^"]+)"\s*;"#).expect("import regex")
});
static GO_PACKAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*option\s+go_package\s*=\s*"([^"]+)"\s*;"#).expect("go_package regex")
});

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProtoFileInfo {
    pub name: String,
    pub package: String,
    pub imports: Vec<String>,
    pub go_package: Option<String>,
}

pub fn proto_file_info(name: &str, content: &str) -> ProtoFileInfo {
    let mut info = ProtoFileInfo {
        name: name.to_string(),
        ..ProtoFileInfo::default()
    };
    if let Some(cap) = PACKAGE_RE.captures(content) {
        info.package = cap[1].to_string();
    }
    for cap in IMPORT_RE.captures_iter(content) {
        let imp = cap[1].to_string();
        if !info.imports.contains(&imp) {
            info.imports.push(imp);
        }
    }
    if let Some(cap) = GO_PACKAGE_RE.captures(content) {
        info.go_package = Some(cap[1].to_string());
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_package_imports_and_option() {
        let src = r#"syntax = "proto3";

package example.api.v1;

import "google/protobuf/timestamp.proto";
import public "example/common.proto";
import "google/protobuf/timestamp.proto";

option go_package = "example.com/repo/api/v1;apiv1";

message Ping {}
"#;
        let info = proto_file_info("ping.proto", src);
        assert_eq!(info.package, "example.api.v1");
        assert_eq!(
            info.imports,
            vec![
                "google/protobuf/timestamp.proto".to_string(),
                "example/common.proto".to_string(),
            ]
        );
        assert_eq!(
            info.go_package.as_deref(),
            Some("example.com/repo/api/v1;apiv1")
        );
    }

    #[test]
    fn empty_file_yields_defaults() {
        let info = proto_file_info("empty.proto", "");
        assert!(info.package.is_empty());
        assert!(info.imports.is_empty());
    }
}
