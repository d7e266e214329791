//! ZAPI: XML documents over HTTPS.
//!
//! A request is a single API element wrapped in a `<netapp>` envelope; the
//! answer wraps its payload in `<netapp><results status="...">`. This module
//! converts between those documents and [`ZapiElement`] trees, and carries
//! the small client that posts them to the ZAPI servlet.

use crate::core::{
    domain::{
        error::{OntapError, OntapResult, TransportError, TransportErrorClass},
        model::{ontap_connection::OntapConnection, rest_call::Verb, zapi_element::ZapiElement},
    },
    infrastructure::transport::{HttpRequest, Transport},
};
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::sync::Arc;
use tracing::{debug, trace};

pub const ZAPI_NAMESPACE: &str = "http://www.netapp.com/filer/admin";
/// ONTAPI minor version sent when none is configured.
pub const DEFAULT_ZAPI_MINOR: u32 = 110;

fn decode_error(message: impl std::fmt::Display) -> OntapError {
    TransportError::new(TransportErrorClass::Decode, message.to_string()).into()
}

/// Serializes `root` as a standalone XML document.
pub fn encode_document(root: &ZapiElement) -> OntapResult<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| decode_error(format!("cannot write XML declaration: {e}")))?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &ZapiElement) -> OntapResult<()> {
    let start = BytesStart::new(element.name()).with_attributes(
        element
            .attributes()
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );
    let write_failed = |e: &dyn std::fmt::Display| {
        decode_error(format!("cannot write element '{}': {e}", element.name()))
    };

    if element.children().is_empty() && element.content().is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| write_failed(&e));
    }
    writer
        .write_event(Event::Start(start))
        .map_err(|e| write_failed(&e))?;
    if let Some(content) = element.content() {
        writer
            .write_event(Event::Text(BytesText::new(content)))
            .map_err(|e| write_failed(&e))?;
    }
    for child in element.children() {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name())))
        .map_err(|e| write_failed(&e))
}

/// Builds the `<netapp>` envelope around an API element.
pub fn request_envelope(api: &ZapiElement, minor_version: u32, vfiler: Option<&str>) -> ZapiElement {
    let mut envelope = ZapiElement::new("netapp")
        .with_attr("version", format!("1.{minor_version}"))
        .with_attr("xmlns", ZAPI_NAMESPACE);
    if let Some(vfiler) = vfiler {
        envelope.set_attr("vfiler", vfiler);
    }
    envelope.with_child(api.clone())
}

/// Wraps a `results` element the way a cluster answers.
pub fn response_envelope(results: ZapiElement) -> ZapiElement {
    ZapiElement::new("netapp")
        .with_attr("version", "1.110")
        .with_attr("xmlns", ZAPI_NAMESPACE)
        .with_child(results)
}

/// Parses a complete XML document into its root element.
///
/// # Errors
/// Returns a `transport` kind error with the `decode` class on malformed XML.
pub fn parse_document(bytes: &[u8]) -> OntapResult<ZapiElement> {
    let text = std::str::from_utf8(bytes).map_err(|e| decode_error(format!("invalid UTF-8: {e}")))?;
    let mut reader = Reader::from_str(text);
    // open elements with the text collected so far
    let mut stack: Vec<(ZapiElement, String)> = Vec::new();
    let mut root: Option<ZapiElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| decode_error(format!("invalid XML: {e}")))?;
        match event {
            Event::Start(start) => stack.push((start_element(&start)?, String::new())),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let (mut element, text) = stack
                    .pop()
                    .ok_or_else(|| decode_error("unbalanced closing tag"))?;
                // whitespace between child elements is formatting
                let keep = if element.children().is_empty() {
                    !text.is_empty()
                } else {
                    !text.trim().is_empty()
                };
                if keep {
                    element.set_content(text);
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| decode_error(format!("invalid text: {e}")))?;
                append_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                append_text(&mut stack, &String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(decode_error("unexpected end of document"));
    }
    root.ok_or_else(|| decode_error("empty document"))
}

fn start_element(start: &BytesStart<'_>) -> OntapResult<ZapiElement> {
    let mut element = ZapiElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| decode_error(format!("invalid attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| decode_error(format!("invalid attribute value: {e}")))?;
        element.set_attr(String::from_utf8_lossy(attr.key.as_ref()), value.into_owned());
    }
    Ok(element)
}

fn attach(
    stack: &mut [(ZapiElement, String)],
    root: &mut Option<ZapiElement>,
    element: ZapiElement,
) -> OntapResult<()> {
    match stack.last_mut() {
        Some((parent, _)) => parent.add_child(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(decode_error("more than one root element")),
    }
    Ok(())
}

fn append_text(stack: &mut [(ZapiElement, String)], text: &str) {
    if let Some((_, buffer)) = stack.last_mut() {
        buffer.push_str(text);
    }
}

/// Decodes a ZAPI answer and returns its `results` element.
///
/// # Errors
/// - `api` kind when `results` has `status="failed"`
/// - `unexpected_shape` when there is no `results` element
/// - `transport` kind (decode) on malformed XML
pub fn decode_response(bytes: &[u8]) -> OntapResult<ZapiElement> {
    let root = parse_document(bytes)?;
    let results = if root.name() == "results" {
        root
    } else {
        root.child("results").cloned().ok_or_else(|| {
            OntapError::UnexpectedShape(format!(
                "ZAPI response has no 'results' element: {}",
                String::from_utf8_lossy(bytes)
            ))
        })?
    };

    if results.attr("status") != Some("passed") {
        let errno = results
            .attr("errno")
            .and_then(|e| e.parse::<i64>().ok())
            .unwrap_or(-1);
        let reason = results
            .attr("reason")
            .unwrap_or("no reason given")
            .to_string();
        return Err(OntapError::Zapi { errno, reason });
    }
    Ok(results)
}

/// Decodes a request document into its API element and optional `vfiler`.
pub fn decode_request(bytes: &[u8]) -> OntapResult<(ZapiElement, Option<String>)> {
    let root = parse_document(bytes)?;
    let vfiler = root.attr("vfiler").map(str::to_string);
    let api = root
        .children()
        .first()
        .cloned()
        .ok_or_else(|| OntapError::UnexpectedShape("ZAPI request has no API element".into()))?;
    Ok((api, vfiler))
}

/// Posts ZAPI documents through a [`Transport`].
pub struct ZapiClient {
    transport: Arc<dyn Transport>,
    connection: OntapConnection,
    minor_version: u32,
    trace_apis: bool,
}

impl ZapiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        connection: OntapConnection,
        minor_version: Option<u32>,
        trace_apis: bool,
    ) -> Self {
        Self {
            transport,
            connection,
            minor_version: minor_version.unwrap_or(DEFAULT_ZAPI_MINOR),
            trace_apis,
        }
    }

    /// Invokes one API, tunneled to `vserver` when given.
    ///
    /// # Errors
    /// Errors are tagged with the API name.
    pub async fn invoke(&self, api: &ZapiElement, vserver: Option<&str>) -> OntapResult<ZapiElement> {
        self.invoke_inner(api, vserver)
            .await
            .map_err(|e| e.context(api.name()))
    }

    async fn invoke_inner(
        &self,
        api: &ZapiElement,
        vserver: Option<&str>,
    ) -> OntapResult<ZapiElement> {
        let document = encode_document(&request_envelope(api, self.minor_version, vserver))?;
        debug!(api = api.name(), vserver, "invoking ZAPI");
        if self.trace_apis {
            debug!(body = %String::from_utf8_lossy(&document), "ZAPI request");
        } else {
            trace!(body = %String::from_utf8_lossy(&document), "ZAPI request");
        }

        let mut request = HttpRequest::new(
            Verb::Post,
            self.connection.zapi_url()?,
            self.connection.request_timeout(),
        );
        request
            .headers
            .insert("content-type".into(), "text/xml; charset=\"UTF-8\"".into());
        request.body = Some(document);

        let response = self.transport.request(request).await?;
        if self.trace_apis {
            debug!(status = response.status, body = %response.body_text(), "ZAPI response");
        }
        if let Some(class) = response.error_class() {
            return Err(TransportError::new(
                class,
                format!("HTTP {}: {}", response.status, response.body_text()),
            )
            .into());
        }
        decode_response(&response.body)
    }

    /// Invokes an iterating API (`*-get-iter`), following `next-tag` and
    /// collecting the `attributes-list` children of every page.
    pub async fn invoke_iter(
        &self,
        api: &ZapiElement,
        vserver: Option<&str>,
    ) -> OntapResult<Vec<ZapiElement>> {
        let mut records = Vec::new();
        let mut request = api.clone();
        loop {
            let results = self.invoke(&request, vserver).await?;
            if let Some(list) = results.child("attributes-list") {
                records.extend(list.children().iter().cloned());
            }
            match results.child_content("next-tag") {
                Some(tag) => {
                    request = without_child(api, "tag").with_child_content("tag", tag);
                }
                None => return Ok(records),
            }
        }
    }
}

fn without_child(element: &ZapiElement, name: &str) -> ZapiElement {
    let mut copy = ZapiElement::new(element.name());
    for (key, value) in element.attributes() {
        copy.set_attr(key.clone(), value.clone());
    }
    if let Some(content) = element.content() {
        copy.set_content(content);
    }
    for child in element.children().iter().filter(|c| c.name() != name) {
        copy.add_child(child.clone());
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use indoc::indoc;
    use serde_json::json;

    #[test]
    fn test_encode_request_envelope() {
        let api = ZapiElement::new("snmp-traphost-add").with_child(
            ZapiElement::new("traphosts").with_child(
                ZapiElement::new("traphost-info").with_child_content("host-name", "example.com"),
            ),
        );
        let xml = encode_document(&request_envelope(&api, 110, Some("svm1"))).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<netapp "));
        assert!(xml.contains("version=\"1.110\""));
        assert!(xml.contains("xmlns=\"http://www.netapp.com/filer/admin\""));
        assert!(xml.contains("vfiler=\"svm1\""));
        assert!(xml.contains(
            "<snmp-traphost-add><traphosts><traphost-info><host-name>example.com</host-name>"
        ));
    }

    #[test]
    fn test_text_is_escaped() {
        let api = ZapiElement::new("volume-modify").with_child_content("comment", "a < b & c");
        let xml = String::from_utf8(encode_document(&api).unwrap()).unwrap();
        assert!(xml.contains("<comment>a &lt; b &amp; c</comment>"));
        let parsed = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(parsed.child_content("comment"), Some("a < b & c"));
    }

    #[test]
    fn test_whitespace_content_round_trip() {
        let api = ZapiElement::new("volume-modify")
            .with_child_content("comment", " ")
            .with_child(ZapiElement::new("attributes").with_child_content("name", "  vol1 "));
        let xml = encode_document(&api).unwrap();
        let parsed = parse_document(&xml).unwrap();
        assert_eq!(parsed, api);
        assert_eq!(parsed.child_content("comment"), Some(" "));
    }

    #[test]
    fn test_indentation_is_not_content() {
        let xml = indoc! {r#"
            <results status='passed'>
              <attributes-list>
                <volume-info><name>vol1</name></volume-info>
              </attributes-list>
            </results>
        "#};
        let parsed = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(parsed.content(), None);
        let list = parsed.child("attributes-list").unwrap();
        assert_eq!(list.content(), None);
        assert_eq!(list.children().len(), 1);
    }

    #[test]
    fn test_tree_round_trip() {
        let mut api = ZapiElement::new("volume-create");
        api.translate_struct(&json!({
            "volume": "vol1",
            "size": 1024,
            "space-reserve": "none",
            "is-online": true,
            "aggr-list": {"aggr-name": ["aggr1", "aggr2"]},
            "empty-node": {}
        }));
        let api = api.with_attr("z", "last").with_attr("a", "first");

        let xml = encode_document(&api).unwrap();
        let parsed = parse_document(&xml).unwrap();
        assert_eq!(parsed, api);
        let names: Vec<_> = parsed
            .child("aggr-list")
            .unwrap()
            .children()
            .iter()
            .map(|c| c.content().unwrap())
            .collect();
        assert_eq!(names, vec!["aggr1", "aggr2"]);
    }

    #[test]
    fn test_decode_passed_response() {
        let xml = indoc! {r#"
            <?xml version='1.0' encoding='UTF-8' ?>
            <netapp version='1.160' xmlns='http://www.netapp.com/filer/admin'>
              <results status="passed">
                <snmp-enabled>true</snmp-enabled>
                <traphosts>
                  <traphost-info><host-name>example.com</host-name></traphost-info>
                </traphosts>
              </results>
            </netapp>
        "#};
        let results = decode_response(xml.as_bytes()).unwrap();
        assert_eq!(results.child_content("snmp-enabled"), Some("true"));
        assert_eq!(
            results
                .find("traphosts/traphost-info/host-name")
                .and_then(ZapiElement::content),
            Some("example.com")
        );
    }

    #[test]
    fn test_decode_failed_response() {
        let xml = indoc! {r#"
            <?xml version='1.0' encoding='UTF-8' ?>
            <netapp version='1.160' xmlns='http://www.netapp.com/filer/admin'>
              <results status="failed" errno="13005" reason="Unable to find API: snmp-foo"/>
            </netapp>
        "#};
        let err = decode_response(xml.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert!(matches!(err, OntapError::Zapi { errno: 13005, ref reason } if reason.contains("snmp-foo")));
        assert_eq!(
            err.to_string(),
            "NetApp API failed. Reason - 13005:Unable to find API: snmp-foo"
        );
    }

    #[test]
    fn test_decode_malformed_and_unexpected() {
        let err = decode_response(b"<netapp><results status='passed'>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = decode_response(b"<netapp version='1.1'><other/></netapp>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedShape);
    }

    #[test]
    fn test_decode_request() {
        let api = ZapiElement::new("snmp-status");
        let xml = encode_document(&request_envelope(&api, 21, None)).unwrap();
        let (decoded, vfiler) = decode_request(&xml).unwrap();
        assert_eq!(decoded.name(), "snmp-status");
        assert_eq!(vfiler, None);
    }

    #[test]
    fn test_without_child_replaces_tag() {
        let api = ZapiElement::new("volume-get-iter")
            .with_child_content("max-records", "100")
            .with_child_content("tag", "old");
        let next = without_child(&api, "tag").with_child_content("tag", "new");
        assert_eq!(next.child_content("tag"), Some("new"));
        assert_eq!(next.children_named("tag").count(), 1);
        assert_eq!(next.child_content("max-records"), Some("100"));
    }
}
