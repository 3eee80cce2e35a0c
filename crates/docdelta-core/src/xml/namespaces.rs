#![allow(non_snake_case)]

use super::xname::XName;

pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub mod W {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    pub fn document() -> XName { XName::new(NS, "document") }
    pub fn body() -> XName { XName::new(NS, "body") }
    pub fn p() -> XName { XName::new(NS, "p") }
    pub fn pPr() -> XName { XName::new(NS, "pPr") }
    pub fn r() -> XName { XName::new(NS, "r") }
    pub fn rPr() -> XName { XName::new(NS, "rPr") }
    pub fn t() -> XName { XName::new(NS, "t") }
    pub fn delText() -> XName { XName::new(NS, "delText") }
    pub fn instrText() -> XName { XName::new(NS, "instrText") }
    pub fn delInstrText() -> XName { XName::new(NS, "delInstrText") }
    pub fn ins() -> XName { XName::new(NS, "ins") }
    pub fn del() -> XName { XName::new(NS, "del") }
    pub fn moveFrom() -> XName { XName::new(NS, "moveFrom") }
    pub fn moveTo() -> XName { XName::new(NS, "moveTo") }
    pub fn moveFromRangeStart() -> XName { XName::new(NS, "moveFromRangeStart") }
    pub fn moveFromRangeEnd() -> XName { XName::new(NS, "moveFromRangeEnd") }
    pub fn moveToRangeStart() -> XName { XName::new(NS, "moveToRangeStart") }
    pub fn moveToRangeEnd() -> XName { XName::new(NS, "moveToRangeEnd") }
    pub fn rPrChange() -> XName { XName::new(NS, "rPrChange") }
    pub fn pPrChange() -> XName { XName::new(NS, "pPrChange") }
    pub fn tr() -> XName { XName::new(NS, "tr") }
    pub fn sdtContent() -> XName { XName::new(NS, "sdtContent") }
    pub fn footnoteReference() -> XName { XName::new(NS, "footnoteReference") }
    pub fn sectPr() -> XName { XName::new(NS, "sectPr") }
    pub fn author() -> XName { XName::new(NS, "author") }
    pub fn id() -> XName { XName::new(NS, "id") }
    pub fn date() -> XName { XName::new(NS, "date") }
    pub fn name() -> XName { XName::new(NS, "name") }
    pub fn type_() -> XName { XName::new(NS, "type") }
    pub fn val() -> XName { XName::new(NS, "val") }
    pub fn hyperlink() -> XName { XName::new(NS, "hyperlink") }
    pub fn tblPrEx() -> XName { XName::new(NS, "tblPrEx") }
    pub fn tab() -> XName { XName::new(NS, "tab") }
    pub fn tbl() -> XName { XName::new(NS, "tbl") }
    pub fn tblPr() -> XName { XName::new(NS, "tblPr") }
    pub fn tblW() -> XName { XName::new(NS, "tblW") }
    pub fn tblGrid() -> XName { XName::new(NS, "tblGrid") }
    pub fn gridCol() -> XName { XName::new(NS, "gridCol") }
    pub fn tc() -> XName { XName::new(NS, "tc") }
    pub fn tcPr() -> XName { XName::new(NS, "tcPr") }
    pub fn tcW() -> XName { XName::new(NS, "tcW") }
    pub fn shd() -> XName { XName::new(NS, "shd") }
    pub fn b() -> XName { XName::new(NS, "b") }
    pub fn w() -> XName { XName::new(NS, "w") }
    pub fn color() -> XName { XName::new(NS, "color") }
    pub fn fill() -> XName { XName::new(NS, "fill") }
}

pub mod R {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    pub fn id() -> XName { XName::new(NS, "id") }
    pub fn embed() -> XName { XName::new(NS, "embed") }
}

pub mod A {
    pub const NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
}

pub mod M {
    pub const NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";
}

pub mod V {
    pub const NS: &str = "urn:schemas-microsoft-com:vml";
}

pub mod O {
    pub const NS: &str = "urn:schemas-microsoft-com:office:office";
}

pub mod WP {
    pub const NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
}

pub mod WPS {
    pub const NS: &str = "http://schemas.microsoft.com/office/word/2010/wordprocessingShape";
}

pub mod W14 {
    pub const NS: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
}

pub mod MC {
    pub const NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

}

pub mod CP {
    pub const NS: &str = "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";
}

pub mod DC {
    pub const NS: &str = "http://purl.org/dc/elements/1.1/";
}

pub mod DCTERMS {
    pub const NS: &str = "http://purl.org/dc/terms/";
}

/// Package relationship parts (`_rels/*.rels`).
pub mod PR {
    pub const NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
}

/// `[Content_Types].xml`.
pub mod CT {
    pub const NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
}

/// Preferred prefix when a namespace is written without an in-scope declaration.
pub fn preferred_prefix(namespace: &str) -> &'static str {
    match namespace {
        W::NS => "w",
        R::NS => "r",
        A::NS => "a",
        M::NS => "m",
        V::NS => "v",
        O::NS => "o",
        WP::NS => "wp",
        WPS::NS => "wps",
        W14::NS => "w14",
        MC::NS => "mc",
        CP::NS => "cp",
        DC::NS => "dc",
        DCTERMS::NS => "dcterms",
        "http://schemas.microsoft.com/office/word/2012/wordml" => "w15",
        "http://schemas.openxmlformats.org/drawingml/2006/picture" => "pic",
        "http://schemas.openxmlformats.org/drawingml/2006/chart" => "c",
        "http://www.w3.org/2001/XMLSchema-instance" => "xsi",
        XMLNS_NS => "xmlns",
        XML_NS => "xml",
        _ => "ns",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_names_are_qualified() {
        assert!(W::moveFromRangeStart().is(W::NS, "moveFromRangeStart"));
        assert!(W::delText().is(W::NS, "delText"));
        assert!(R::embed().is(R::NS, "embed"));
    }

    #[test]
    fn preferred_prefixes() {
        assert_eq!(preferred_prefix(W::NS), "w");
        assert_eq!(preferred_prefix(XML_NS), "xml");
        assert_eq!(preferred_prefix("urn:unknown"), "ns");
    }
}
