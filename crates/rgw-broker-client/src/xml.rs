//! Minimal readers for the S3 XML documents the broker consumes.

use quick_xml::Reader;
use quick_xml::events::Event;

/// Failure to read an XML document.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Malformed XML.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// Text content that could not be decoded or unescaped.
    #[error("invalid text content: {0}")]
    Text(String),
}

/// Parsed `<Error>` document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct S3ErrorBody {
    /// `<Code>` text.
    pub code: String,
    /// `<Message>` text.
    pub message: String,
}

/// Parse an S3 error body. Missing elements are left empty.
pub fn parse_error(xml: &[u8]) -> Result<S3ErrorBody, XmlError> {
    let mut body = S3ErrorBody::default();
    for_each_text(xml, |path, text| match path {
        ["Error", "Code"] => body.code = text,
        ["Error", "Message"] => body.message = text,
        _ => {}
    })?;
    Ok(body)
}

/// Bucket names from a `ListAllMyBucketsResult` document.
pub fn parse_bucket_names(xml: &[u8]) -> Result<Vec<String>, XmlError> {
    let mut names = Vec::new();
    for_each_text(xml, |path, text| {
        if let [.., "Bucket", "Name"] = path {
            names.push(text);
        }
    })?;
    Ok(names)
}

/// Walk the document, calling `f` with the element path and decoded text of
/// every text node.
fn for_each_text(
    xml: &[u8],
    mut f: impl FnMut(&[&str], String),
) -> Result<(), XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => {
                let decoded = e.decode().map_err(|err| XmlError::Text(err.to_string()))?;
                let text = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::Text(err.to_string()))?
                    .into_owned();
                let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                f(&path, text);
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_error_body() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><RequestId>tx1</RequestId></Error>"#;
        let err = parse_error(xml).unwrap();
        assert_eq!(err.code, "NoSuchKey");
        assert_eq!(err.message, "The specified key does not exist.");
    }

    #[test]
    fn test_should_parse_bucket_list() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner><ID>admin</ID><DisplayName>admin</DisplayName></Owner>
  <Buckets>
    <Bucket><Name>kube-rgw-data</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>
    <Bucket><Name>b1</Name><CreationDate>2024-01-02T00:00:00.000Z</CreationDate></Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#;
        let names = parse_bucket_names(xml).unwrap();
        assert_eq!(names, ["kube-rgw-data", "b1"]);
    }

    #[test]
    fn test_should_return_empty_error_for_empty_body() {
        assert_eq!(parse_error(b"").unwrap(), S3ErrorBody::default());
    }
}
