use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{gem_download_url, gem_homepage_url, TOOL_NAME};
use crate::ir::Dependency;

pub const SPDX_VERSION: &str = "SPDX-2.3";
const DOCUMENT_ID: &str = "SPDXRef-DOCUMENT";

static ID_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\-_]").unwrap());

/// Replace everything except ASCII letters, digits, `-` and `_` with `-`.
pub fn sanitize_id(name: &str) -> String {
    ID_UNSAFE.replace_all(name, "-").into_owned()
}

fn package_id(name: &str) -> String {
    format!("SPDXRef-Package-{}", sanitize_id(name))
}

/// Build an SPDX 2.3 document describing `dependencies`.
pub fn document(dependencies: &[Dependency], project_name: &str, created: &str) -> Value {
    let mut packages = vec![json!({
        "SPDXID": package_id(project_name),
        "name": project_name,
        "downloadLocation": "NOASSERTION",
        "filesAnalyzed": false,
        "copyrightText": "NOASSERTION",
    })];

    packages.extend(dependencies.iter().map(|dep| {
        json!({
            "SPDXID": package_id(&dep.name),
            "name": dep.name,
            "versionInfo": dep.version,
            "downloadLocation": gem_download_url(dep),
            "filesAnalyzed": false,
            "homepage": gem_homepage_url(dep),
            "copyrightText": "NOASSERTION",
            "externalRefs": [{
                "referenceCategory": "PACKAGE-MANAGER",
                "referenceType": "purl",
                "referenceLocator": dep.purl(),
            }],
        })
    }));

    let relationships: Vec<Value> = dependencies
        .iter()
        .map(|dep| {
            json!({
                "spdxElementId": DOCUMENT_ID,
                "relationshipType": "DESCRIBES",
                "relatedSpdxElement": package_id(&dep.name),
            })
        })
        .collect();

    json!({
        "spdxVersion": SPDX_VERSION,
        "dataLicense": "CC0-1.0",
        "SPDXID": DOCUMENT_ID,
        "name": format!("{}-sbom", project_name),
        "documentNamespace": format!(
            "https://gem-guard.dev/{}/{}",
            sanitize_id(project_name),
            created
        ),
        "creationInfo": {
            "created": created,
            "creators": [format!("Tool: {}-{}", TOOL_NAME, env!("CARGO_PKG_VERSION"))],
            "licenseListVersion": "3.21",
        },
        "packages": packages,
        "relationships": relationships,
    })
}
