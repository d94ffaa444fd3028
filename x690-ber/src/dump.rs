//! Human-readable rendering of a node tree

use crate::node::{ApplicationSpecific, Asn1Node, TaggedPayload, TaggedValue};
use x690_core::OidRegistry;

const INDENT: &str = "    ";
const HEX_TRUNCATE: usize = 32;

/// Render a node tree with well-known object identifiers named.
pub fn dump(node: &Asn1Node) -> String {
    dump_with_registry(node, OidRegistry::well_known())
}

/// Render a node tree, resolving identifier names through `registry`.
pub fn dump_with_registry(node: &Asn1Node, registry: &OidRegistry) -> String {
    let mut out = String::new();
    dump_node(&mut out, node, registry, 0);
    out
}

fn dump_node(out: &mut String, node: &Asn1Node, registry: &OidRegistry, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    match node {
        Asn1Node::Boolean(value) => {
            out.push_str(&format!("BOOLEAN {}\n", value));
        }
        Asn1Node::Integer(value) => {
            out.push_str(&format!("INTEGER {}\n", value));
        }
        Asn1Node::Enumerated(value) => {
            out.push_str(&format!("ENUMERATED {}\n", value));
        }
        Asn1Node::BitString(value) => {
            out.push_str(&format!(
                "BIT STRING ({} bit(s)) {}\n",
                value.num_bits(),
                hex_preview(value.as_bytes())
            ));
        }
        Asn1Node::OctetString(value) => {
            out.push_str(&format!(
                "OCTET STRING ({} byte(s)) {}\n",
                value.len(),
                hex_preview(value)
            ));
        }
        Asn1Node::Null => out.push_str("NULL\n"),
        Asn1Node::ObjectIdentifier(oid) => match registry.name_of(oid) {
            Some(name) => out.push_str(&format!("OBJECT IDENTIFIER {} ({})\n", oid, name)),
            None => out.push_str(&format!("OBJECT IDENTIFIER {}\n", oid)),
        },
        Asn1Node::UniversalString(value) => {
            out.push_str(&format!("UniversalString {}\n", hex_preview(value)));
        }
        Asn1Node::Sequence(children) => {
            out.push_str("SEQUENCE\n");
            for child in children {
                dump_node(out, child, registry, depth + 1);
            }
        }
        Asn1Node::Set(children) => {
            out.push_str("SET\n");
            for child in children {
                dump_node(out, child, registry, depth + 1);
            }
        }
        Asn1Node::Tagged(tagged) => dump_tagged(out, tagged, registry, depth),
        Asn1Node::ApplicationSpecific(app) => dump_application(out, app, registry, depth),
        Asn1Node::Unknown { tag, contents } => {
            out.push_str(&format!(
                "Unknown {:?} {}\n",
                tag,
                hex_preview(contents)
            ));
        }
        other => {
            // The remaining variants all carry text
            let text = other.as_str().unwrap_or("");
            out.push_str(&format!("{} {:?}\n", other.type_name(), text));
        }
    }
}

fn dump_tagged(out: &mut String, tagged: &TaggedValue, registry: &OidRegistry, depth: usize) {
    match tagged.payload() {
        TaggedPayload::Parsed(inner) => {
            let mode = if tagged.is_explicit() { "EXPLICIT" } else { "IMPLICIT" };
            out.push_str(&format!("[{}] {}\n", tagged.tag_no(), mode));
            dump_node(out, inner, registry, depth + 1);
        }
        TaggedPayload::Raw { contents, .. } => {
            out.push_str(&format!(
                "[{}] IMPLICIT {}\n",
                tagged.tag_no(),
                hex_preview(contents)
            ));
        }
    }
}

fn dump_application(
    out: &mut String,
    app: &ApplicationSpecific,
    registry: &OidRegistry,
    depth: usize,
) {
    out.push_str(&format!("APPLICATION [{}]\n", app.tag_no()));
    if let Ok(inner) = app.inner() {
        dump_node(out, &inner, registry, depth + 1);
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    let mut out = String::new();
    for byte in bytes.iter().take(HEX_TRUNCATE) {
        out.push_str(&format!("{:02X}", byte));
    }
    if bytes.len() > HEX_TRUNCATE {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use x690_core::ObjectIdentifier;

    #[test]
    fn test_dump_names_known_oid() {
        let oid = ObjectIdentifier::from_string("1.2.840.113549.1.1.1").unwrap();
        let node = Asn1Node::Sequence(vec![Asn1Node::from(oid), Asn1Node::Null]);
        let rendered = dump(&node);
        assert!(rendered.contains("SEQUENCE"));
        assert!(rendered.contains("rsaEncryption"));
        assert!(rendered.contains("NULL"));
    }

    #[test]
    fn test_dump_indents_nesting() {
        let node = Asn1Node::Sequence(vec![Asn1Node::Sequence(vec![Asn1Node::Boolean(true)])]);
        let rendered = dump(&node);
        assert!(rendered.contains("\n    SEQUENCE\n        BOOLEAN true\n"));
    }

    #[test]
    fn test_dump_truncates_long_octets() {
        let node = Asn1Node::OctetString(vec![0xAB; 64]);
        let rendered = dump(&node);
        assert!(rendered.contains("..."));
        assert!(rendered.contains("(64 byte(s))"));
    }
}
