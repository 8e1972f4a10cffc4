//! Parsing of `vboxmanage list vms` output.
//!
//! Each machine is printed as `"<name>" {<uuid>}`. The scan walks the text
//! front to back, consuming every match before looking for the next one, so
//! text inside an already-matched name is never reconsidered.

use std::sync::LazyLock;

use regex::Regex;

use crate::record::VmRecord;

// `.` does not cross newlines, so a match never spans two lines. The greedy
// name capture keeps embedded quotes: `"a "b" c" {x}` names `a "b" c`.
static LISTING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.*)"[ \t]*\{([^}\n]*)\}"#).expect("valid listing regex"));

pub fn parse_list_vms(text: &str) -> Vec<VmRecord> {
    LISTING_LINE
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let id = caps.get(2)?.as_str().trim();
            let record = VmRecord::from_listing(name, id);
            if record.is_none() {
                tracing::debug!(line = &caps[0], "skipping malformed listing entry");
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_machines_in_order() {
        let text = "\"Alpha\" {11111111-1111-1111-1111-111111111111}\n\"Beta\" {22222222-2222-2222-2222-222222222222}";
        let records = parse_list_vms(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display_name, "Alpha");
        assert_eq!(records[0].identifier, "11111111-1111-1111-1111-111111111111");
        assert_eq!(records[1].display_name, "Beta");
        assert_eq!(records[1].identifier, "22222222-2222-2222-2222-222222222222");
        assert!(records.iter().all(|r| r.source_path.is_none()));
    }

    #[test]
    fn names_with_spaces_and_quotes() {
        let text = "\"My VM\" {aaaa}\n\"The \"old\" box\" {bbbb}\n";
        let records = parse_list_vms(text);
        assert_eq!(records[0].display_name, "My VM");
        assert_eq!(records[1].display_name, "The \"old\" box");
        assert_eq!(records[1].identifier, "bbbb");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "\
Oracle VM VirtualBox Command Line Management Interface
\"NoBraces\"
\"\" {cccc}
\"EmptyId\" {}
\"Good\" {dddd}
";
        let records = parse_list_vms(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name, "Good");
    }

    #[test]
    fn crlf_and_trailing_whitespace() {
        let text = "\"Alpha\"   {1111}\r\n\"Beta\"\t{2222}   \r\n";
        let records = parse_list_vms(text);
        let ids: Vec<_> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, ["1111", "2222"]);
    }

    #[test]
    fn empty_output() {
        assert!(parse_list_vms("").is_empty());
        assert!(parse_list_vms("\n\n").is_empty());
    }
}
