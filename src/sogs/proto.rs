//! Protobuf schema for room message envelopes
//!
//! Hand-maintained subset of the messenger's `SignalService` proto2 schema.
//! Fields the bot never reads are left out; prost skips unknown tags on
//! decode. Proto2 `required` fields are declared `optional` here so their
//! absence is reported by envelope verification instead of being silently
//! defaulted.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Content {
    #[prost(message, optional, tag = "1")]
    pub data_message: ::core::option::Option<DataMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataMessage {
    #[prost(string, optional, tag = "1")]
    pub body: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "2")]
    pub attachments: ::prost::alloc::vec::Vec<AttachmentPointer>,
    #[prost(uint32, optional, tag = "4")]
    pub flags: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub expire_timer: ::core::option::Option<u32>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub profile_key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(uint64, optional, tag = "7")]
    pub timestamp: ::core::option::Option<u64>,
    #[prost(message, optional, tag = "8")]
    pub quote: ::core::option::Option<Quote>,
    #[prost(message, optional, tag = "101")]
    pub profile: ::core::option::Option<LokiProfile>,
}

/// proto2: `id` and `author` are required.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Quote {
    #[prost(uint64, optional, tag = "1")]
    pub id: ::core::option::Option<u64>,
    #[prost(string, optional, tag = "2")]
    pub author: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "3")]
    pub text: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "4")]
    pub attachments: ::prost::alloc::vec::Vec<QuotedAttachment>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuotedAttachment {
    #[prost(string, optional, tag = "1")]
    pub content_type: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "2")]
    pub file_name: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "3")]
    pub thumbnail: ::core::option::Option<AttachmentPointer>,
    #[prost(uint32, optional, tag = "4")]
    pub flags: ::core::option::Option<u32>,
}

/// proto2: `id` is required.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AttachmentPointer {
    #[prost(fixed64, optional, tag = "1")]
    pub id: ::core::option::Option<u64>,
    #[prost(string, optional, tag = "2")]
    pub content_type: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(uint32, optional, tag = "4")]
    pub size: ::core::option::Option<u32>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub digest: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(string, optional, tag = "7")]
    pub file_name: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(uint32, optional, tag = "8")]
    pub flags: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    pub width: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "10")]
    pub height: ::core::option::Option<u32>,
    #[prost(string, optional, tag = "11")]
    pub caption: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "101")]
    pub url: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LokiProfile {
    #[prost(string, optional, tag = "1")]
    pub display_name: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "2")]
    pub profile_picture: ::core::option::Option<::prost::alloc::string::String>,
}
