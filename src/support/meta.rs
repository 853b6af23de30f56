// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Supports for statements that only carry data: documentation, defaults,
//! cardinality annotations and linkage leaf statements. None of them run
//! phase callbacks.

use crate::ast::{ArgValue, StatementKeyword};
use crate::error::StructuralError;
use crate::source::Span;
use crate::support::{ArgSpec, StatementSupport};

macro_rules! simple_support {
    ($name:ident, $static_name:ident, $kw:ident, $spec:ident) => {
        pub struct $name;
        impl StatementSupport for $name {
            fn keyword(&self) -> StatementKeyword {
                StatementKeyword::$kw
            }
            fn argument(&self) -> ArgSpec {
                ArgSpec::$spec
            }
        }
        pub static $static_name: $name = $name;
    };
}

simple_support!(NamespaceSupport, NAMESPACE, Namespace, Text);
simple_support!(PrefixSupport, PREFIX, Prefix, Identifier);
simple_support!(RevisionSupport, REVISION, Revision, Text);
simple_support!(RevisionDateSupport, REVISION_DATE, RevisionDate, Text);
simple_support!(BelongsToSupport, BELONGS_TO, BelongsTo, Identifier);
simple_support!(KeySupport, KEY, Key, Text);
simple_support!(DefaultSupport, DEFAULT, Default, Text);
simple_support!(UnitsSupport, UNITS, Units, Text);
simple_support!(MandatorySupport, MANDATORY, Mandatory, Bool);
simple_support!(ConfigSupport, CONFIG, Config, Bool);
simple_support!(MinElementsSupport, MIN_ELEMENTS, MinElements, Uint);
simple_support!(PresenceSupport, PRESENCE, Presence, Text);
simple_support!(WhenSupport, WHEN, When, Text);
simple_support!(DescriptionSupport, DESCRIPTION, Description, Text);
simple_support!(ReferenceSupport, REFERENCE, Reference, Text);
simple_support!(OrganizationSupport, ORGANIZATION, Organization, Text);
simple_support!(ContactSupport, CONTACT, Contact, Text);
simple_support!(ErrorMessageSupport, ERROR_MESSAGE, ErrorMessage, Text);
simple_support!(ErrorAppTagSupport, ERROR_APP_TAG, ErrorAppTag, Text);

pub struct YangVersionSupport;
impl StatementSupport for YangVersionSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::YangVersion
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Text
    }
    fn validate_argument(&self, arg: &ArgValue, span: &Span) -> Result<(), StructuralError> {
        match arg.as_str() {
            Some("1") | Some("1.1") => Ok(()),
            _ => Err(StructuralError::MalformedArgument {
                keyword: self.keyword(),
                text: arg.as_str().unwrap_or_default().to_string(),
                reason: "expected '1' or '1.1'".to_string(),
                at: span.location(),
            }),
        }
    }
}
pub static YANG_VERSION: YangVersionSupport = YangVersionSupport;

pub struct StatusSupport;
impl StatementSupport for StatusSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Status
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }
    fn validate_argument(&self, arg: &ArgValue, span: &Span) -> Result<(), StructuralError> {
        match arg.as_str() {
            Some("current") | Some("deprecated") | Some("obsolete") => Ok(()),
            _ => Err(StructuralError::MalformedArgument {
                keyword: self.keyword(),
                text: arg.as_str().unwrap_or_default().to_string(),
                reason: "expected 'current', 'deprecated' or 'obsolete'".to_string(),
                at: span.location(),
            }),
        }
    }
}
pub static STATUS: StatusSupport = StatusSupport;

pub struct MaxElementsSupport;
impl StatementSupport for MaxElementsSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::MaxElements
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Text
    }
    fn validate_argument(&self, arg: &ArgValue, span: &Span) -> Result<(), StructuralError> {
        let text = arg.as_str().unwrap_or_default();
        if text == "unbounded" || text.parse::<u64>().map(|v| v > 0).unwrap_or(false) {
            return Ok(());
        }
        Err(StructuralError::MalformedArgument {
            keyword: self.keyword(),
            text: text.to_string(),
            reason: "expected 'unbounded' or a positive integer".to_string(),
            at: span.location(),
        })
    }
}
pub static MAX_ELEMENTS: MaxElementsSupport = MaxElementsSupport;
