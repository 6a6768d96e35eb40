use serde::{Deserialize, Serialize};

/// Storage notification as delivered to the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventTime")]
    pub event_time: String,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Form-encoded: `+` is a space, `%XX` is a byte.
    pub key: String,
    pub size: u64,
}

/// Recovers the real object key from its notification form.
///
/// `+` is turned into a space before percent-decoding so that an encoded
/// `%2B` survives as a literal plus. Malformed escapes are kept verbatim and
/// byte sequences that are not UTF-8 become U+FFFD.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plus_decodes_to_space() {
        assert_eq!(decode_object_key("my+file.txt"), "my file.txt");
    }

    #[test]
    fn percent_escapes_decode_to_bytes() {
        assert_eq!(decode_object_key("a%20b.csv"), "a b.csv");
        assert_eq!(decode_object_key("a%2Bb.txt"), "a+b.txt");
        assert_eq!(
            decode_object_key("reports/%C3%BCbersicht+2024.pdf"),
            "reports/übersicht 2024.pdf"
        );
    }

    #[test]
    fn malformed_escapes_pass_through() {
        assert_eq!(decode_object_key("100%+done"), "100% done");
        assert_eq!(decode_object_key("bad%zzkey"), "bad%zzkey");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        assert_eq!(decode_object_key("x%FFy"), "x\u{FFFD}y");
    }

    #[test]
    fn parses_notification_records() {
        let event: S3Event = serde_json::from_value(json!({
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventTime": "2024-01-01T00:00:00.000Z",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "b1", "arn": "arn:aws:s3:::b1" },
                    "object": { "key": "a%2Bb.txt", "size": 42, "eTag": "abc" }
                }
            }]
        }))
        .expect("notification should parse");

        assert_eq!(event.records.len(), 1);
        let record = &event.records[0];
        assert_eq!(record.s3.bucket.name, "b1");
        assert_eq!(record.s3.object.key, "a%2Bb.txt");
        assert_eq!(record.s3.object.size, 42);
        assert_eq!(record.event_time, "2024-01-01T00:00:00.000Z");
    }
}
