// The XML metadata that fixes every offset, length, and bit layout the
// symbol/index regions rely on. On read we normalize the single-field
// "object instead of list" quirk; on write we compute every offset from
// the data rather than trust a caller-supplied layout.

use memchr::memmem;
use serde::{Deserialize, Serialize};

use qvd_base::{malformed_header, write_unrepresentable, Error};

use crate::value::EncodeMetadata;

const HEADER_TERMINATOR: &[u8; 3] = b"\r\n\0";

#[derive(Clone, Debug)]
pub(crate) struct FieldDescriptor {
    pub name: String,
    pub symbol_offset: usize,
    pub symbol_length: usize,
    pub bit_offset: u32,
    pub bit_width: u32,
    pub bias: i64,
    pub symbol_count: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct LayoutDescriptor {
    pub fields: Vec<FieldDescriptor>,
    pub record_byte_size: u32,
    pub row_count: usize,
    pub symbol_region_length: usize,
    pub index_region_length: usize,
}

pub(crate) struct ParsedHeader {
    pub layout: LayoutDescriptor,
    /// Offset of the first byte of the symbol region (i.e. right after the
    /// CR LF NUL terminator).
    pub symbol_region_start: usize,
}

pub(crate) fn parse_header(bytes: &[u8]) -> Result<ParsedHeader, Error> {
    // `memmem::find` returns `Some(0)` for a match at the very start, unlike
    // the truthiness check the original reader used to reject that case.
    let term_pos = memmem::find(bytes, HEADER_TERMINATOR)
        .ok_or_else(|| malformed_header("missing CR LF NUL terminator"))?;

    let xml_bytes = &bytes[..term_pos];
    let xml_str = std::str::from_utf8(xml_bytes)
        .map_err(|e| malformed_header(format!("header is not valid UTF-8: {e}")))?;

    let header: QvdTableHeaderXml = quick_xml::de::from_str(xml_str)
        .map_err(|e| malformed_header(format!("XML parse failure: {e}")))?;

    let layout = header.into_layout()?;
    Ok(ParsedHeader {
        layout,
        symbol_region_start: term_pos + HEADER_TERMINATOR.len(),
    })
}

pub(crate) fn build_header(
    layout: &LayoutDescriptor,
    metadata: &EncodeMetadata,
) -> Result<String, Error> {
    let header = QvdTableHeaderXml::from_layout(layout, metadata);

    let mut body = String::new();
    {
        let mut ser = quick_xml::se::Serializer::new(&mut body);
        ser.indent(' ', 2);
        header
            .serialize(ser)
            .map_err(|e| write_unrepresentable(format!("header serialization failed: {e}")))?;
    }
    // quick-xml writes LF between elements; QVD headers use CRLF throughout.
    let body = body.replace('\n', "\r\n");
    Ok(format!("{body}\r\n"))
}

fn parse_usize(s: &str, field: &str) -> Result<usize, Error> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| malformed_header(format!("{field} is not a valid non-negative integer: {s:?}")))
}

fn parse_u32(s: &str, field: &str) -> Result<u32, Error> {
    s.trim()
        .parse::<u32>()
        .map_err(|_| malformed_header(format!("{field} is not a valid non-negative integer: {s:?}")))
}

fn parse_i64(s: &str, field: &str) -> Result<i64, Error> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| malformed_header(format!("{field} is not a valid integer: {s:?}")))
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename = "QvdTableHeader")]
struct QvdTableHeaderXml {
    #[serde(default)]
    QvBuildNo: String,
    #[serde(default)]
    CreatorDoc: String,
    #[serde(default)]
    CreateUtcTime: String,
    #[serde(default)]
    SourceCreateUtcTime: String,
    #[serde(default)]
    SourceFileUtcTime: String,
    #[serde(default)]
    StaleUtcTime: String,
    #[serde(default)]
    SourceFileSize: String,
    #[serde(default)]
    TableName: String,
    Fields: FieldsXml,
    NoOfRecords: String,
    RecordByteSize: String,
    Offset: String,
    Length: String,
    #[serde(default)]
    Compression: String,
    #[serde(default)]
    EncryptionInfo: String,
    #[serde(default)]
    Comment: String,
    #[serde(default)]
    TableTags: String,
    #[serde(default)]
    ProfilingData: String,
    #[serde(default)]
    Lineage: Option<LineageXml>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct FieldsXml {
    #[serde(rename = "QvdFieldHeader", deserialize_with = "one_or_many")]
    qvd_field_header: Vec<QvdFieldHeaderXml>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<QvdFieldHeaderXml>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(QvdFieldHeaderXml),
        Many(Vec<QvdFieldHeaderXml>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(field) => vec![field],
        OneOrMany::Many(fields) => fields,
    })
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
struct QvdFieldHeaderXml {
    FieldName: String,
    #[serde(default)]
    BitOffset: String,
    #[serde(default)]
    BitWidth: String,
    #[serde(default)]
    Bias: String,
    #[serde(default)]
    NoOfSymbols: String,
    Offset: String,
    Length: String,
    #[serde(default)]
    Comment: String,
    #[serde(default)]
    NumberFormat: Option<NumberFormatXml>,
    #[serde(default)]
    Tags: Option<TagsXml>,
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct NumberFormatXml {
    #[serde(default)]
    Type: String,
    #[serde(default)]
    nDec: String,
    #[serde(default)]
    UseThou: String,
    #[serde(default)]
    Fmt: String,
    #[serde(default)]
    Dec: String,
    #[serde(default)]
    Thou: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct TagsXml {}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
struct LineageXml {
    LineageInfo: LineageInfoXml,
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
struct LineageInfoXml {
    #[serde(default)]
    Discriminator: String,
    #[serde(default)]
    Statement: String,
}

impl QvdTableHeaderXml {
    fn into_layout(self) -> Result<LayoutDescriptor, Error> {
        let row_count = parse_usize(&self.NoOfRecords, "NoOfRecords")?;
        let record_byte_size = parse_u32(&self.RecordByteSize, "RecordByteSize")?;
        let symbol_region_length = parse_usize(&self.Offset, "Offset")?;
        let index_region_length = parse_usize(&self.Length, "Length")?;

        let mut fields = Vec::with_capacity(self.Fields.qvd_field_header.len());
        for f in self.Fields.qvd_field_header {
            fields.push(FieldDescriptor {
                name: f.FieldName,
                symbol_offset: parse_usize(&f.Offset, "Fields.QvdFieldHeader.Offset")?,
                symbol_length: parse_usize(&f.Length, "Fields.QvdFieldHeader.Length")?,
                bit_offset: parse_u32(&f.BitOffset, "Fields.QvdFieldHeader.BitOffset")?,
                bit_width: parse_u32(&f.BitWidth, "Fields.QvdFieldHeader.BitWidth")?,
                bias: parse_i64(&f.Bias, "Fields.QvdFieldHeader.Bias")?,
                symbol_count: parse_usize(&f.NoOfSymbols, "Fields.QvdFieldHeader.NoOfSymbols")?,
            });
        }

        if fields.is_empty() {
            return Err(malformed_header("Fields.QvdFieldHeader has no entries"));
        }

        Ok(LayoutDescriptor {
            fields,
            record_byte_size,
            row_count,
            symbol_region_length,
            index_region_length,
        })
    }

    fn from_layout(layout: &LayoutDescriptor, metadata: &EncodeMetadata) -> Self {
        QvdTableHeaderXml {
            QvBuildNo: String::new(),
            CreatorDoc: metadata.creator_doc.clone(),
            CreateUtcTime: metadata.create_utc_time.clone(),
            SourceCreateUtcTime: String::new(),
            SourceFileUtcTime: String::new(),
            StaleUtcTime: String::new(),
            SourceFileSize: "-1".to_string(),
            TableName: metadata.table_name.clone(),
            Fields: FieldsXml {
                qvd_field_header: layout
                    .fields
                    .iter()
                    .map(|f| QvdFieldHeaderXml {
                        FieldName: f.name.clone(),
                        BitOffset: f.bit_offset.to_string(),
                        BitWidth: f.bit_width.to_string(),
                        Bias: f.bias.to_string(),
                        NoOfSymbols: f.symbol_count.to_string(),
                        Offset: f.symbol_offset.to_string(),
                        Length: f.symbol_length.to_string(),
                        Comment: String::new(),
                        NumberFormat: Some(NumberFormatXml {
                            Type: "UNKNOWN".to_string(),
                            nDec: "0".to_string(),
                            UseThou: "0".to_string(),
                            Fmt: String::new(),
                            Dec: String::new(),
                            Thou: String::new(),
                        }),
                        Tags: Some(TagsXml {}),
                    })
                    .collect(),
            },
            NoOfRecords: layout.row_count.to_string(),
            RecordByteSize: layout.record_byte_size.to_string(),
            Offset: layout.symbol_region_length.to_string(),
            Length: layout.index_region_length.to_string(),
            Compression: String::new(),
            EncryptionInfo: String::new(),
            Comment: String::new(),
            TableTags: String::new(),
            ProfilingData: String::new(),
            Lineage: Some(LineageXml {
                LineageInfo: LineageInfoXml {
                    Discriminator: "INLINE;".to_string(),
                    Statement: String::new(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header_bytes() -> Vec<u8> {
        let xml = "<QvdTableHeader>\
<NoOfRecords>2</NoOfRecords>\
<RecordByteSize>1</RecordByteSize>\
<Offset>10</Offset>\
<Length>2</Length>\
<Fields><QvdFieldHeader>\
<FieldName>A</FieldName><BitOffset>0</BitOffset><BitWidth>1</BitWidth>\
<Bias>0</Bias><NoOfSymbols>2</NoOfSymbols><Offset>0</Offset><Length>10</Length>\
</QvdFieldHeader></Fields>\
</QvdTableHeader>";
        let mut bytes = xml.as_bytes().to_vec();
        bytes.extend_from_slice(HEADER_TERMINATOR);
        bytes
    }

    #[test]
    fn parses_single_field_as_list() {
        let bytes = sample_header_bytes();
        let parsed = parse_header(&bytes).expect("header should parse");
        assert_eq!(parsed.layout.fields.len(), 1);
        assert_eq!(parsed.layout.fields[0].name, "A");
        assert_eq!(parsed.layout.row_count, 2);
        assert_eq!(parsed.symbol_region_start, bytes.len());
    }

    #[test]
    fn missing_terminator_is_malformed_header() {
        let xml = b"<QvdTableHeader></QvdTableHeader>".to_vec();
        assert!(parse_header(&xml).is_err());
    }

    #[test]
    fn terminator_at_offset_zero_is_still_found() {
        // The original reader's truthiness check treated offset 0 as "not
        // found"; this one must not reproduce that.
        let mut bytes = HEADER_TERMINATOR.to_vec();
        bytes.extend_from_slice(b"<QvdTableHeader></QvdTableHeader>");
        // This isn't a valid header (terminator precedes any XML), but the
        // terminator search itself must still report offset 0 as a match.
        assert_eq!(memmem::find(&bytes, HEADER_TERMINATOR), Some(0));
    }
}
