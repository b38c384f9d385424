//! Body encoding (SPEC_FULL §4.10): turns a `BodyVariant` into bytes plus a default
//! `Content-Type`, so the pipeline only sets the header when the caller hasn't already.

use bytes::Bytes;
use rand::Rng;

use crate::error::{BodyError, NetfetchError, Result};

use super::options::BodyVariant;

pub struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

pub fn encode(body: &BodyVariant) -> Result<EncodedBody> {
    match body {
        BodyVariant::None => Ok(EncodedBody { bytes: Bytes::new(), content_type: None }),
        BodyVariant::Json(value) => {
            let bytes = serde_json::to_vec(value)
                .map_err(|e| NetfetchError::Body(BodyError::EncodingFailed(e.to_string())))?;
            Ok(EncodedBody { bytes: bytes.into(), content_type: Some("application/json".into()) })
        }
        BodyVariant::Xml(value) => {
            let xml = encode_xml_value("root", value);
            Ok(EncodedBody { bytes: Bytes::from(xml.into_bytes()), content_type: Some("application/xml".into()) })
        }
        BodyVariant::Form(pairs) => {
            let mut out = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in pairs {
                out.append_pair(k, v);
            }
            Ok(EncodedBody {
                bytes: Bytes::from(out.finish().into_bytes()),
                content_type: Some("application/x-www-form-urlencoded".into()),
            })
        }
        BodyVariant::Text(s) => {
            Ok(EncodedBody { bytes: Bytes::from(s.clone().into_bytes()), content_type: Some("text/plain; charset=utf-8".into()) })
        }
        BodyVariant::Binary(bytes, ct) => Ok(EncodedBody {
            bytes: bytes.clone(),
            content_type: Some(ct.clone().unwrap_or_else(|| "application/octet-stream".into())),
        }),
        BodyVariant::Multipart { fields, files } => encode_multipart(fields, files),
        BodyVariant::Raw(bytes) => Ok(EncodedBody { bytes: bytes.clone(), content_type: None }),
    }
}

/// Minimal field-to-tag XML serializer (SPEC_FULL §4.10): a `serde_json::Value` object's
/// top-level keys become sibling elements, nested objects/arrays recurse. No attributes or
/// namespaces — just enough structure for a round-trip.
pub fn encode_xml_value(root: &str, value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_xml_node(&mut out, root, value);
    out
}

fn write_xml_node(out: &mut String, tag: &str, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            out.push_str(&format!("<{tag}>"));
            for (k, v) in map {
                write_xml_node(out, k, v);
            }
            out.push_str(&format!("</{tag}>"));
        }
        serde_json::Value::Array(items) => {
            for item in items {
                write_xml_node(out, tag, item);
            }
        }
        serde_json::Value::Null => out.push_str(&format!("<{tag}/>")),
        other => {
            out.push_str(&format!("<{tag}>{}</{tag}>", escape_xml(&value_to_text(other))));
        }
    }
}

fn value_to_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn random_boundary() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let tail: String = (0..24).map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char).collect();
    format!("netfetch-boundary-{tail}")
}

fn encode_multipart(
    fields: &[(String, String)],
    files: &[super::options::MultipartFile],
) -> Result<EncodedBody> {
    let boundary = random_boundary();
    let mut buf = Vec::new();

    for (name, value) in fields {
        buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    for file in files {
        buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let ct = file.content_type.clone().unwrap_or_else(|| "application/octet-stream".into());
        buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.filename, ct
            )
            .as_bytes(),
        );
        buf.extend_from_slice(&file.bytes);
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(EncodedBody {
        bytes: Bytes::from(buf),
        content_type: Some(format!("multipart/form-data; boundary={boundary}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::options::MultipartFile;

    #[test]
    fn json_body_sets_content_type_and_serializes() {
        let v = serde_json::json!({"a": 1});
        let encoded = encode(&BodyVariant::Json(v)).unwrap();
        assert_eq!(encoded.content_type.as_deref(), Some("application/json"));
        assert_eq!(&*encoded.bytes, br#"{"a":1}"#);
    }

    #[test]
    fn form_body_url_encodes_pairs() {
        let encoded = encode(&BodyVariant::Form(vec![("q".into(), "a b".into())])).unwrap();
        assert_eq!(&*encoded.bytes, b"q=a+b");
    }

    #[test]
    fn xml_round_trips_simple_object_fields_as_tags() {
        let v = serde_json::json!({"name": "ada", "age": 30});
        let xml = encode_xml_value("person", &v);
        assert!(xml.starts_with("<person>") && xml.ends_with("</person>"));
        assert!(xml.contains("<name>ada</name>"));
        assert!(xml.contains("<age>30</age>"));
    }

    #[test]
    fn xml_escapes_angle_brackets_and_ampersands() {
        let v = serde_json::json!({"note": "a & b <c>"});
        let xml = encode_xml_value("root", &v);
        assert!(xml.contains("a &amp; b &lt;c&gt;"));
    }

    #[test]
    fn xml_body_variant_sets_content_type_and_uses_the_struct_to_tag_encoder() {
        let v = serde_json::json!({"name": "ada"});
        let encoded = encode(&BodyVariant::Xml(v)).unwrap();
        assert_eq!(encoded.content_type.as_deref(), Some("application/xml"));
        assert_eq!(&*encoded.bytes, b"<root><name>ada</name></root>");
    }

    #[test]
    fn multipart_includes_field_and_file_parts_with_boundary() {
        let encoded = encode(&BodyVariant::Multipart {
            fields: vec![("name".into(), "ada".into())],
            files: vec![MultipartFile {
                field: "avatar".into(),
                filename: "a.png".into(),
                bytes: Bytes::from_static(b"\x89PNG"),
                content_type: Some("image/png".into()),
            }],
        })
        .unwrap();
        let ct = encoded.content_type.unwrap();
        assert!(ct.starts_with("multipart/form-data; boundary=netfetch-boundary-"));
        let body = String::from_utf8_lossy(&encoded.bytes);
        assert!(body.contains("name=\"name\""));
        assert!(body.contains("filename=\"a.png\""));
        assert!(body.contains("Content-Type: image/png"));
    }

    #[test]
    fn binary_body_defaults_to_octet_stream() {
        let encoded = encode(&BodyVariant::Binary(Bytes::from_static(b"\x01\x02"), None)).unwrap();
        assert_eq!(encoded.content_type.as_deref(), Some("application/octet-stream"));
    }
}
