/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

/// # Must not compile tests
///
/// Returned Cursor cannot outlive the Document:
/// ```compile_fail
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::str::FromStr;
/// use stanzaflow::Document;
/// use stanzaflow::Cursor;
/// let c: Cursor;
/// {
///     let doc = Document::from_str("<a><b/></a>")?;
///     c = doc.root();
/// }
/// println!("{}", c);
/// # Ok(())
/// # }
/// ```
///
/// Cursor copies cannot outlive the Document:
/// ```compile_fail
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::str::FromStr;
/// use stanzaflow::Document;
/// use stanzaflow::Cursor;
/// let c2: Cursor;
/// {
///     let doc = Document::from_str("<a><b/></a>")?;
///     let c1 = doc.root().find_tag("b");
///     c2 = c1;
/// }
/// println!("{}", c2);
/// # Ok(())
/// # }
/// ```
///
/// Document cannot be edited while a Cursor is alive:
/// ```compile_fail
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::str::FromStr;
/// use stanzaflow::Document;
/// let mut doc = Document::from_str("<a><b/></a>")?;
/// let b = doc.root().find_tag("b");
/// doc.root_mut().insert_tag("c")?;
/// println!("{}", b);
/// # Ok(())
/// # }
/// ```
///
/// XPath results cannot outlive the Document:
/// ```compile_fail
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::str::FromStr;
/// use stanzaflow::Document;
/// use stanzaflow::XPath;
/// use stanzaflow::XPathSequence;
/// let xpath = XPath::new("//b")?;
/// let result: XPathSequence;
/// {
///     let doc = Document::from_str("<a><b/></a>")?;
///     result = xpath.apply(&doc)?;
/// }
/// println!("{}", result);
/// # Ok(())
/// # }
/// ```
///
#[cfg(doctest)]
struct MustNotCompileTests;
