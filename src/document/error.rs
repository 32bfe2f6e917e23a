/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub(crate) mod description {
    pub(crate) const NO_DOCUMENT: &str = "no document parsed yet";
    pub(crate) const NO_START_TAG: &str = "content without a start tag";
    pub(crate) const TAG_OUTSIDE_ROOT: &str = "tags cannot be outside of the root tag";
    pub(crate) const TAG_MISMATCH: &str = "start and end tags have different names";
    pub(crate) const DUPLICATE_ATTRIBUTE: &str = "attribute name already used in this tag";
    pub(crate) const CDATA_ATTRIBUTE: &str = "attributes cannot be set on CDATA elements";
    pub(crate) const CDATA_CHILDREN: &str = "child elements cannot be added on CDATA elements";
}
