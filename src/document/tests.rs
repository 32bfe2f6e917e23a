/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::error::description::*;
use super::*;

fn check_doc_xml(doc: &Document, expected: &str) {
    let xml = doc.to_string();
    assert_eq!(xml, expected);
    // Verify that the capacity is measured correctly
    assert_eq!(xml.len(), xml.capacity());
    // Verify that the Display and to_string are same
    let xml2 = format!("{}", doc);
    assert_eq!(xml2, expected);
}

#[test]
fn it_works() {
    let mut doc = Document::new("html");
    doc.insert_tag("p")
        .unwrap()
        .insert_tag("b")
        .unwrap()
        .insert_tag("blink")
        .unwrap()
        .insert_cdata("lala")
        .unwrap();
    doc.root_mut()
        .insert_cdata("foo&")
        .unwrap()
        .insert_tag("p2")
        .unwrap();

    check_doc_xml(
        &doc,
        "<html><p><b><blink>lala</blink></b></p>foo&amp;<p2/></html>",
    );
}

#[test]
fn merged_cdata() {
    let mut doc = Document::new("body");
    doc.root_mut()
        .insert_cdata("abc")
        .unwrap()
        .insert_cdata("<def>")
        .unwrap();
    assert_eq!(doc.first_child().cdata(), "abc<def>");
    assert!(doc.first_child().next().is_null());
    check_doc_xml(&doc, "<body>abc&lt;def&gt;</body>");
}

#[test]
fn attributes() {
    let mut doc = Document::new("doc");
    doc.insert_tag("a")
        .unwrap()
        .insert_attribute("i", "1")
        .unwrap()
        .insert_attribute("j", "2")
        .unwrap();
    let a = doc.find_tag("a").id().unwrap();
    assert_eq!(
        doc.node_mut(a).insert_attribute("i", "1").err(),
        Some(ParseError::BadXml(DUPLICATE_ATTRIBUTE))
    );
    assert_eq!(
        doc.node_mut(a).insert_attribute("j", "1").err(),
        Some(ParseError::BadXml(DUPLICATE_ATTRIBUTE))
    );
    doc.insert_tag("b")
        .unwrap()
        .set_attribute("i", Some("1"))
        .unwrap()
        .set_attribute("i", Some("2"))
        .unwrap();
    check_doc_xml(&doc, "<doc><a i=\"1\" j=\"2\"/><b i=\"2\"/></doc>");

    doc.node_mut(a).set_attribute("i", None).unwrap();
    check_doc_xml(&doc, "<doc><a j=\"2\"/><b i=\"2\"/></doc>");
    doc.node_mut(a).set_attribute("k", Some("x'y")).unwrap();
    check_doc_xml(&doc, "<doc><a j=\"2\" k=\"x&apos;y\"/><b i=\"2\"/></doc>");

    let mut iter = doc.find_tag("a").attributes();
    assert_eq!(iter.next(), Some(("j", "2")));
    assert_eq!(iter.next(), Some(("k", "x'y")));
    assert_eq!(iter.next(), None);
}

#[test]
fn cdata_edits() {
    let doc = Document::from_str("<a>text</a>").unwrap();
    let text = doc.first_child().id().unwrap();
    let mut doc = doc;
    assert_eq!(
        doc.node_mut(text).insert_tag("b").err(),
        Some(ParseError::BadXml(CDATA_CHILDREN))
    );
    assert_eq!(
        doc.node_mut(text).insert_cdata("b").err(),
        Some(ParseError::BadXml(CDATA_CHILDREN))
    );
    assert_eq!(
        doc.node_mut(text).insert_attribute("b", "1").err(),
        Some(ParseError::BadXml(CDATA_ATTRIBUTE))
    );
    assert_eq!(
        doc.node_mut(text).set_attribute("b", None).err(),
        Some(ParseError::BadXml(CDATA_ATTRIBUTE))
    );
}

#[test]
fn namespaces() {
    let doc = Document::from_str(
        "<iq xmlns='jabber:client' type='get'><query xmlns='jabber:iq:roster'/><x:y xmlns:x='urn:x'><z/></x:y></iq>",
    )
    .unwrap();
    assert_eq!(doc.attribute("xmlns"), None);
    assert_eq!(doc.root().namespace_uri(), Some("jabber:client"));
    assert_eq!(doc.find_tag("query").namespace_uri(), Some("jabber:iq:roster"));
    let y = doc.find_tag("x:y");
    assert_eq!(y.local_name(), "y");
    assert_eq!(y.prefix(), Some("x"));
    assert_eq!(y.namespace_uri(), Some("urn:x"));
    assert_eq!(y.first_tag().namespace_uri(), Some("jabber:client"));
    assert_eq!(y.lookup_namespace(Some("xml")), Some(XML_NAMESPACE));
    assert_eq!(y.lookup_namespace(Some("nope")), None);
    check_doc_xml(
        &doc,
        "<iq xmlns=\"jabber:client\" type=\"get\"><query xmlns=\"jabber:iq:roster\"/><x:y xmlns:x=\"urn:x\"><z/></x:y></iq>",
    );

    let mut doc = Document::new("stream:error");
    doc.set_inherited_namespaces(vec![
        Namespace::new(Some("stream"), "http://etherx.jabber.org/streams"),
        Namespace::new(None, "jabber:client"),
    ]);
    assert_eq!(
        doc.root().namespace_uri(),
        Some("http://etherx.jabber.org/streams")
    );
    assert_eq!(doc.root().lookup_namespace(None), Some("jabber:client"));
    check_doc_xml(&doc, "<stream:error/>");

    let mut doc = Document::new("a");
    assert_eq!(
        doc.root_mut()
            .declare_namespace(None, "urn:a")
            .unwrap()
            .declare_namespace(None, "urn:b")
            .err(),
        Some(ParseError::BadXml(DUPLICATE_ATTRIBUTE))
    );
    doc.root_mut().set_attribute("xmlns", Some("urn:c")).unwrap();
    check_doc_xml(&doc, "<a xmlns=\"urn:c\"/>");
}

#[test]
fn navigation() {
    let doc = Document::from_str("<a><b>123<c/>456</b>.,;<d/> <e x='1' y='2'> lala<f/></e>789</a>")
        .unwrap();
    assert_eq!(doc.root().first_tag().first_tag().to_string(), "<c/>");
    assert_eq!(doc.root().first_child().next().to_string(), ".,;");
    assert_eq!(doc.root().first_child().next().next().to_string(), "<d/>");
    assert_eq!(doc.root().first_child().next_tag().to_string(), "<d/>");
    assert_eq!(doc.root().first_tag().last_child().cdata(), "456");
    assert_eq!(doc.root().last_child().to_string(), "789");
    // Whitespace only text between d and e is dropped
    assert_eq!(doc.root().last_child().previous().previous().to_string(), "<d/>");
    assert_eq!(
        doc.root()
            .last_child()
            .previous_tag()
            .previous_tag()
            .to_string(),
        "<d/>"
    );
    assert_eq!(
        doc.root().last_child().previous().first_tag().to_string(),
        "<f/>"
    );
    assert_eq!(
        doc.first_child()
            .first_tag()
            .parent()
            .next_tag()
            .next_tag()
            .find_tag("f")
            .root()
            .find_tag("e")
            .first_child()
            .to_string(),
        " lala"
    );
    assert_eq!(doc.first_tag().first_tag().to_string(), "<c/>");
    assert_eq!(
        doc.find_tag("e").to_string(),
        "<e x=\"1\" y=\"2\"> lala<f/></e>"
    );
    assert_eq!(doc.find_tag("e").text(), " lala");
    assert_eq!(doc.root().text(), "123456.,; lala789");
}

#[test]
fn whitespace() {
    let doc = Document::from_str("<a>\n  <b> x </b>\n  <c>\t</c>\n</a>").unwrap();
    check_doc_xml(&doc, "<a><b> x </b><c/></a>");
}

#[test]
fn serialize_subset() {
    let doc = Document::from_str("<a><b>lala</b><c>bibi</c><d><e>123</e></d></a>").unwrap();
    assert_eq!(doc.first_child().to_string(), "<b>lala</b>");
    assert_eq!(doc.find_tag("c").to_string(), "<c>bibi</c>");
    assert_eq!(doc.find_tag("d").to_string(), "<d><e>123</e></d>");
    assert_eq!(doc.find_tag("d").first_child().to_string(), "<e>123</e>");
    assert_eq!(
        doc.find_tag("d").str_size(),
        doc.find_tag("d").to_string().len()
    );
}

#[test]
fn subtree_copy() {
    let doc = Document::from_str(
        "<message xmlns='jabber:client'><body>hi</body><x xmlns='urn:x' a='1'>t<y/>u</x></message>",
    )
    .unwrap();
    let copy = doc.find_tag("x").to_document().unwrap();
    check_doc_xml(&copy, "<x xmlns=\"urn:x\" a=\"1\">t<y/>u</x>");
    let copy = doc.root().to_document().unwrap();
    assert_eq!(copy.to_string(), doc.to_string());
    assert!(doc.find_tag("x").first_child().to_document().is_none());
}

#[test]
fn cursor_copy() {
    let doc = Document::from_str("<a><b>lala</b><c>bibi</c><d><e>123</e></d></a>").unwrap();

    let c4: Cursor;
    {
        let c1 = doc.root();
        c4 = c1;
        let c2 = c1.find_tag("d").first_child();
        assert_eq!(c2.first_child().to_string(), "123");
        let c3 = c1.find_tag("b").first_child();
        assert_eq!(c3.to_string(), "lala");
    }
    assert_eq!(c4.find_tag("c").first_child().to_string(), "bibi");
    assert_eq!(c4, doc.root());
    assert_ne!(c4, doc.find_tag("c"));
    assert_eq!(doc.cursor(doc.find_tag("c").id().unwrap()).name(), "c");
}

#[test]
fn iterators() {
    let doc = Document::from_str("<a>lala<b><c>bibi</c><d><e>123</e></d>456</b>foo</a>").unwrap();

    let mut iter = doc.find_tag("b").descendant_or_self();
    assert_eq!(iter.next().unwrap().name(), "b");
    assert_eq!(iter.next().unwrap().name(), "c");
    assert_eq!(iter.next().unwrap().cdata(), "bibi");
    assert_eq!(iter.next().unwrap().name(), "d");
    assert_eq!(iter.next().unwrap().name(), "e");
    assert_eq!(iter.next().unwrap().cdata(), "123");
    assert_eq!(iter.next().unwrap().cdata(), "456");
    assert!(iter.next().is_none());

    let mut iter = doc.find_tag("b").children();
    assert_eq!(iter.next().unwrap().name(), "c");
    assert_eq!(iter.next().unwrap().name(), "d");
    assert_eq!(iter.next().unwrap().cdata(), "456");
    assert!(iter.next().is_none());

    assert_eq!(doc.root().descendant_or_self().count(), 10);
}

#[test]
fn null_checks() {
    let doc = Document::new("a");

    // property
    assert!(doc.root().next().is_null());
    assert!(!doc.root().next().is_tag());
    assert_eq!(doc.root().next().name(), "");
    assert_eq!(doc.root().next().attribute("lala"), None);
    assert_eq!(doc.root().next().cdata(), "");
    assert_eq!(doc.root().next().str_size(), 0);
    assert_eq!(doc.root().next().to_string(), "");
    assert_eq!(format!("{}", doc.root().next()), "");
    assert_eq!(doc.root().next().namespace_uri(), None);
    // navigation
    assert!(doc.root().next().next().is_null());
    assert!(doc.root().next().next_tag().is_null());
    assert!(doc.root().next().previous().is_null());
    assert!(doc.root().next().previous_tag().is_null());
    assert!(doc.root().next().first_child().is_null());
    assert!(doc.root().next().last_child().is_null());
    assert!(doc.root().next().first_tag().is_null());
    assert!(doc.root().next().parent().is_null());
    assert!(doc.root().next().root().is_null());
    assert!(doc.root().next().find_tag("lala").is_null());
    // iterators
    assert!(doc.root().next().children().next().is_none());
    assert!(doc.root().next().descendant_or_self().next().is_none());
    assert!(doc.root().next().attributes().next().is_none());
}

#[test]
fn chunked_parser() {
    let xml = "<presence from='a@b/c'><status>ğü &amp; ş</status></presence>";
    for split in 0..xml.len() {
        let mut parser = DocumentParser::new();
        parser.parse_bytes(&xml.as_bytes()[..split]).unwrap();
        parser.parse_bytes(&xml.as_bytes()[split..]).unwrap();
        let doc = parser.into_document().unwrap();
        assert_eq!(doc.find_tag("status").text(), "ğü & ş");
    }
}

#[test]
fn bad_doc_parser() {
    assert_eq!(
        Document::from_str("<a>lala</b>").err(),
        Some(ParseError::BadXml(TAG_MISMATCH))
    );
    assert_eq!(
        Document::from_str("<a><b><c/></d></a>").err(),
        Some(ParseError::BadXml(TAG_MISMATCH))
    );
    assert_eq!(
        Document::from_str("<a><b><c/></b><d></d><e></e2></a>").err(),
        Some(ParseError::BadXml(TAG_MISMATCH))
    );
    assert_eq!(
        Document::from_str("<a><b x=\"1\" y=\"2\" x=\"abc\"/></a>").err(),
        Some(ParseError::BadXml(DUPLICATE_ATTRIBUTE))
    );
    assert!(Document::from_str("").is_err());
    assert!(Document::from_str("<a>").is_err());
}
