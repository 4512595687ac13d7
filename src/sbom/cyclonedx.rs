use serde_json::{json, Value};
use uuid::Uuid;

use super::{gem_download_url, gem_homepage_url, TOOL_NAME};
use crate::ir::Dependency;

pub const CYCLONEDX_SPEC_VERSION: &str = "1.5";

/// Build a CycloneDX 1.5 BOM with a fresh random serial number.
pub fn document(dependencies: &[Dependency], project_name: &str, created: &str) -> Value {
    let components: Vec<Value> = dependencies
        .iter()
        .map(|dep| {
            json!({
                "type": "library",
                "bom-ref": dep.purl(),
                "name": dep.name,
                "version": dep.version,
                "purl": dep.purl(),
                "externalReferences": [
                    { "type": "distribution", "url": gem_download_url(dep) },
                    { "type": "website", "url": gem_homepage_url(dep) },
                ],
            })
        })
        .collect();

    json!({
        "bomFormat": "CycloneDX",
        "specVersion": CYCLONEDX_SPEC_VERSION,
        "serialNumber": format!("urn:uuid:{}", Uuid::new_v4()),
        "version": 1,
        "metadata": {
            "timestamp": created,
            "tools": [{
                "vendor": "gem-guard",
                "name": TOOL_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }],
            "component": {
                "type": "application",
                "name": project_name,
                "version": "1.0.0",
            },
        },
        "components": components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DEFAULT_SOURCE;

    fn deps() -> Vec<Dependency> {
        vec![Dependency::new("nokogiri", "1.18.8", DEFAULT_SOURCE)]
    }

    #[test]
    fn header_and_metadata() {
        let doc = document(&deps(), "shop", "2024-03-01T12:30:00Z");
        assert_eq!(doc["bomFormat"], "CycloneDX");
        assert_eq!(doc["specVersion"], "1.5");
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["metadata"]["timestamp"], "2024-03-01T12:30:00Z");
        assert_eq!(doc["metadata"]["component"]["name"], "shop");
        assert_eq!(doc["metadata"]["tools"][0]["name"], "gemguard");
    }

    #[test]
    fn serial_is_uuid_urn() {
        let doc = document(&deps(), "shop", "t");
        let serial = doc["serialNumber"].as_str().unwrap();
        let uuid = serial.strip_prefix("urn:uuid:").unwrap();
        assert_eq!(Uuid::parse_str(uuid).unwrap().get_version_num(), 4);

        let other = document(&deps(), "shop", "t");
        assert_ne!(doc["serialNumber"], other["serialNumber"]);
    }

    #[test]
    fn components_carry_purl_and_references() {
        let doc = document(&deps(), "shop", "t");
        let component = &doc["components"][0];
        assert_eq!(component["type"], "library");
        assert_eq!(component["bom-ref"], "pkg:gem/nokogiri@1.18.8");
        assert_eq!(component["purl"], "pkg:gem/nokogiri@1.18.8");
        assert_eq!(
            component["externalReferences"][0]["url"],
            "https://rubygems.org/downloads/nokogiri-1.18.8.gem"
        );
        assert_eq!(
            component["externalReferences"][1]["url"],
            "https://rubygems.org/gems/nokogiri"
        );
    }
}
