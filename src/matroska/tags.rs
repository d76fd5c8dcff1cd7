//! Metadata and elements that are only dumped.
use crate::ebml::{define_elements, Many};
use crate::Result;

define_elements! {
    /// Metadata.
    Tags(TAGS, multiple) = 0x1254_C367, Some(1), Master [TAG];
    /// A set of metadata entries for some targets.
    Tag(TAG, multiple) = 0x7373, Some(2), Master [TARGETS, SIMPLE_TAG];
    /// What the entries apply to.
    Targets(TARGETS) = 0x63C0, Some(3), Master [TARGET_TYPE_VALUE, TARGET_TYPE, TAG_TRACK_UID];
    /// Logical level of the target.
    TargetTypeValue(TARGET_TYPE_VALUE) = 0x68CA, Some(4), Uint;
    /// Name of the logical level.
    TargetType(TARGET_TYPE) = 0x63CA, Some(4), Utf8;
    /// Track the entries apply to.
    TagTrackUID(TAG_TRACK_UID, multiple) = 0x63C5, Some(4), Uint;
    /// A single entry.
    SimpleTag(SIMPLE_TAG, multiple) = 0x67C8, Some(3), Master [
        TAG_NAME, TAG_LANGUAGE, TAG_DEFAULT, TAG_STRING, TAG_BINARY,
    ];
    /// Entry name.
    TagName(TAG_NAME) = 0x45A3, Some(4), Utf8;
    /// Entry language.
    TagLanguage(TAG_LANGUAGE) = 0x447A, Some(4), Utf8;
    /// Whether this is the default language.
    TagDefault(TAG_DEFAULT) = 0x4484, Some(4), Uint;
    /// Text value.
    TagString(TAG_STRING) = 0x4487, Some(4), Utf8;
    /// Binary value.
    TagBinary(TAG_BINARY) = 0x4485, Some(4), Bytes;

    /// Chapters (not interpreted).
    Chapters(CHAPTERS) = 0x1043_A770, Some(1), Master;
    /// Attached files (not interpreted).
    Attachments(ATTACHMENTS) = 0x1941_A469, Some(1), Master;
}

impl Tags {
    /// Returns the tags.
    pub fn tags(&self) -> Result<Many<Tag>> {
        track!(self.many::<Tag>())
    }
}

impl Tag {
    /// Returns the entries.
    pub fn simple_tags(&self) -> Result<Many<SimpleTag>> {
        track!(self.many::<SimpleTag>())
    }
}

impl SimpleTag {
    /// Returns the entry name.
    pub fn tag_name(&self) -> Result<String> {
        track!(self.one::<TagName>().and_then(|e| e.read_utf8()))
    }

    /// Returns the text value.
    pub fn tag_string(&self) -> Result<Option<String>> {
        match track!(self.maybe_one::<TagString>())? {
            Some(e) => Ok(Some(track!(e.read_utf8())?)),
            None => Ok(None),
        }
    }
}
