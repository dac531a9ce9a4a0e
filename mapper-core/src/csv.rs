// CSV import/export for the address book
//
// Format: `address,name` per line, optional header row. The name is the rest of
// the line after the first comma, so it may contain commas itself.

use crate::address::Address;
use crate::mapping::AddressMapping;

const HEADER: &str = "address,name";

/// Parse CSV text into a mapping.
///
/// Lines without a comma, with an invalid address or with an empty name are
/// skipped. A later line for the same address replaces an earlier one.
pub fn parse(csv_text: &str) -> AddressMapping {
    let text = csv_text.strip_prefix('\u{feff}').unwrap_or(csv_text);
    let mut mapping = AddressMapping::new();
    let mut skipped = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((raw_address, raw_name)) = line.split_once(',') else {
            skipped += 1;
            continue;
        };
        let address = clean_field(raw_address);
        if address.eq_ignore_ascii_case("address") {
            continue;
        }
        let name = clean_field(raw_name);
        match Address::parse(address) {
            Some(address) if !name.is_empty() => {
                mapping.insert(&address, name);
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::debug!("CSV parse skipped {} malformed line(s)", skipped);
    }
    mapping
}

/// Render a mapping as CSV with a header row, in address order.
///
/// Names containing a comma are quoted. Embedded double quotes and newlines
/// are not escaped.
pub fn serialize(mapping: &AddressMapping) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + mapping.len() * 64);
    out.push_str(HEADER);
    out.push('\n');
    for (address, name) in mapping.iter() {
        out.push_str(address);
        out.push(',');
        if name.contains(',') {
            out.push('"');
            out.push_str(name);
            out.push('"');
        } else {
            out.push_str(name);
        }
        out.push('\n');
    }
    out
}

fn clean_field(field: &str) -> &str {
    field
        .trim()
        .trim_matches('"')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0xABCDEF12340000000000000000000056789ABCDE";

    fn addr(n: usize) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    #[test]
    fn test_parse_lowercases_key() {
        let mapping = parse(&format!("{},Alice Wallet\n", ALICE));
        assert_eq!(mapping.len(), 1);
        let (key, name) = mapping.iter().next().unwrap();
        assert_eq!(key, ALICE.to_ascii_lowercase());
        assert_eq!(name, "Alice Wallet");
    }

    #[test]
    fn test_parse_skips_header_and_bad_rows() {
        let csv = format!(
            "Address,Name\n\n{},Alice\n0x{},TooShort\n0x{},TooLong\nnot-an-address,Nobody\n{}\n{},   \n",
            ALICE,
            "a".repeat(39),
            "a".repeat(41),
            addr(1),
            addr(2),
        );
        let mapping = parse(&csv);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get(ALICE), Some("Alice"));
        assert!(!mapping.contains("address"));
    }

    #[test]
    fn test_parse_name_keeps_commas_and_strips_double_quotes() {
        let csv = format!(
            "\u{feff}\"{}\" , \"Treasury, Cold\"\r\n{},'Hot'\r\n",
            addr(1),
            addr(2)
        );
        let mapping = parse(&csv);
        assert_eq!(mapping.get(addr(1).as_str()), Some("Treasury, Cold"));
        assert_eq!(mapping.get(addr(2).as_str()), Some("'Hot'"));
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let csv = format!("{},First\n{},Second\n", ALICE, ALICE.to_ascii_lowercase());
        let mapping = parse(&csv);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get(ALICE), Some("Second"));
    }

    #[test]
    fn test_serialize_quotes_commas() {
        let mut mapping = AddressMapping::new();
        mapping.insert(&addr(2), "Exchange, Hot");
        mapping.insert(&addr(1), "Alice");
        let csv = serialize(&mapping);
        assert_eq!(
            csv,
            format!("address,name\n{},Alice\n{},\"Exchange, Hot\"\n", addr(1), addr(2))
        );
    }

    #[test]
    fn test_serialize_then_parse_preserves_mapping() {
        let mapping: AddressMapping = (0..30)
            .map(|i| (addr(i), format!("Wallet #{} (team, ops)", i)))
            .collect();
        assert_eq!(parse(&serialize(&mapping)), mapping);
        assert_eq!(parse(&serialize(&AddressMapping::new())), AddressMapping::new());
    }
}
