//! Extraction of the market document and its bidding zone from a raw event.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marks the start of the embedded market document in an event message.
pub const PAYLOAD_MARKER: &str = "<msg:Payload>";

static BIDDING_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<inBiddingZone_Domain\.mRID(?:\s[^>]*)?>\s*([^<\s]+)\s*</inBiddingZone_Domain\.mRID>")
        .expect("bidding zone pattern is valid")
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("event message has no {PAYLOAD_MARKER} marker")]
    MissingPayloadMarker,
    #[error("payload has no inBiddingZone_Domain.mRID element")]
    MissingBiddingZone,
}

/// Returns everything after the first `<msg:Payload>` marker.
pub fn extract_event_payload(event_msg: &str) -> Result<&str, ExtractError> {
    event_msg
        .split_once(PAYLOAD_MARKER)
        .map(|(_, payload)| payload)
        .ok_or(ExtractError::MissingPayloadMarker)
}

/// Returns the EIC code of the first `inBiddingZone_Domain.mRID` element.
pub fn extract_region_code(payload: &str) -> Result<&str, ExtractError> {
    BIDDING_ZONE
        .captures(payload)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(ExtractError::MissingBiddingZone)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "<msg:Message><msg:Payload>...<inBiddingZone_Domain.mRID>10YDE-VE-------2</inBiddingZone_Domain.mRID>...";

    #[test]
    fn payload_is_text_after_marker() {
        let payload = extract_event_payload(SCENARIO).unwrap();
        assert_eq!(
            payload,
            "...<inBiddingZone_Domain.mRID>10YDE-VE-------2</inBiddingZone_Domain.mRID>..."
        );
    }

    #[test]
    fn payload_extraction_holds_for_arbitrary_prefixes_and_suffixes() {
        for (prefix, suffix) in [("", ""), ("header", "<doc/>"), ("a<msg:", "x\ny"), ("ünï", "çødé")] {
            let msg = format!("{prefix}{PAYLOAD_MARKER}{suffix}");
            assert_eq!(extract_event_payload(&msg), Ok(suffix));
        }
    }

    #[test]
    fn payload_keeps_later_markers() {
        let msg = format!("head{PAYLOAD_MARKER}one{PAYLOAD_MARKER}two");
        assert_eq!(extract_event_payload(&msg), Ok(format!("one{PAYLOAD_MARKER}two").as_str()));
    }

    #[test]
    fn missing_marker_is_rejected() {
        for msg in ["", "<msg:Message/>", "<msg:payload>lowercase", "msg:Payload>"] {
            assert_eq!(extract_event_payload(msg), Err(ExtractError::MissingPayloadMarker));
        }
    }

    #[test]
    fn region_code_from_scenario() {
        let payload = extract_event_payload(SCENARIO).unwrap();
        assert_eq!(extract_region_code(payload), Ok("10YDE-VE-------2"));
    }

    #[test]
    fn region_code_allows_attributes_and_takes_first_match() {
        let payload = r#"<TimeSeries>
            <inBiddingZone_Domain.mRID codingScheme="A01">10YDE-EON------1</inBiddingZone_Domain.mRID>
        </TimeSeries>
        <TimeSeries>
            <inBiddingZone_Domain.mRID codingScheme="A01">10YDE-VE-------2</inBiddingZone_Domain.mRID>
        </TimeSeries>"#;

        assert_eq!(extract_region_code(payload), Ok("10YDE-EON------1"));
    }

    #[test]
    fn missing_region_code_is_rejected() {
        assert_eq!(
            extract_region_code("<outBiddingZone_Domain.mRID>10YDE-VE-------2</outBiddingZone_Domain.mRID>"),
            Err(ExtractError::MissingBiddingZone)
        );
        assert_eq!(
            extract_region_code("<inBiddingZone_Domain.mRID></inBiddingZone_Domain.mRID>"),
            Err(ExtractError::MissingBiddingZone)
        );
    }
}
