//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const SAMPLE_MASHUP: &str = "section Section1;\r\nshared Sales = let\r\n    Source = 1\r\nin\r\n    Source;\r\n";

pub fn inline_part(path: &str, content: &[u8]) -> Value {
    json!({
        "path": path,
        "payload": STANDARD.encode(content),
        "payloadType": "InlineBase64",
    })
}

pub fn raw_part(path: &str, payload: &str, payload_type: &str) -> Value {
    json!({ "path": path, "payload": payload, "payloadType": payload_type })
}

pub fn export_document(parts: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec_pretty(&json!({ "definition": { "parts": parts } }))
        .expect("export document should serialize")
}

pub fn platform_json(display_name: &str) -> String {
    json!({
        "$schema": "https://developer.microsoft.com/json-schemas/fabric/gitIntegration/platformProperties/2.0.0/schema.json",
        "metadata": { "type": "Dataflow", "displayName": display_name },
        "config": { "version": "2.0", "logicalId": "9f2e7c1a-0000-4000-8000-000000000001" }
    })
    .to_string()
}

/// A typical three-part dataflow export.
pub fn dataflow_export(display_name: &str) -> Vec<u8> {
    let query_metadata = json!({
        "formatVersion": "202502",
        "computeEngineSettings": {},
        "name": display_name,
        "queriesMetadata": {
            "Sales": { "queryId": "1b7f0c9e-0000-4000-8000-00000000000a", "queryName": "Sales", "loadEnabled": true },
            "Dates": { "queryId": "1b7f0c9e-0000-4000-8000-00000000000b", "queryName": "Dates" },
            "Helper": { "isHidden": true }
        }
    })
    .to_string();
    export_document(vec![
        inline_part("queryMetadata.json", query_metadata.as_bytes()),
        inline_part("mashup.pq", SAMPLE_MASHUP.as_bytes()),
        inline_part(".platform", platform_json(display_name).as_bytes()),
    ])
}

pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(bytes).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn zip_member_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("archive should open");
    archive.file_names().map(str::to_string).collect::<Vec<_>>()
}

pub fn read_zip_member(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive should open");
    let mut file = archive
        .by_name(name)
        .unwrap_or_else(|e| panic!("member {name} missing: {e}"));
    let mut out = Vec::new();
    file.read_to_end(&mut out).expect("member should read");
    out
}

/// Member names in central-directory order.
pub fn zip_member_names_ordered(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive should open");
    (0..archive.len())
        .map(|i| {
            archive
                .by_index(i)
                .expect("entry should read")
                .name()
                .to_string()
        })
        .collect()
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, bytes).expect("write file");
}
