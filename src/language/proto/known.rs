//! Well-known protobuf imports and the targets that provide them.

/// Imports bundled with the protobuf distribution. Resolving one yields a
/// label under `@com_google_protobuf` instead of an index lookup.
pub const WELL_KNOWN_PROTOS: &[(&str, &str)] = &[
    ("google/protobuf/any.proto", "@com_google_protobuf//:any_proto"),
    ("google/protobuf/api.proto", "@com_google_protobuf//:api_proto"),
    (
        "google/protobuf/compiler/plugin.proto",
        "@com_google_protobuf//:compiler_plugin_proto",
    ),
    (
        "google/protobuf/descriptor.proto",
        "@com_google_protobuf//:descriptor_proto",
    ),
    (
        "google/protobuf/duration.proto",
        "@com_google_protobuf//:duration_proto",
    ),
    ("google/protobuf/empty.proto", "@com_google_protobuf//:empty_proto"),
    (
        "google/protobuf/field_mask.proto",
        "@com_google_protobuf//:field_mask_proto",
    ),
    (
        "google/protobuf/source_context.proto",
        "@com_google_protobuf//:source_context_proto",
    ),
    (
        "google/protobuf/struct.proto",
        "@com_google_protobuf//:struct_proto",
    ),
    (
        "google/protobuf/timestamp.proto",
        "@com_google_protobuf//:timestamp_proto",
    ),
    ("google/protobuf/type.proto", "@com_google_protobuf//:type_proto"),
    (
        "google/protobuf/wrappers.proto",
        "@com_google_protobuf//:wrappers_proto",
    ),
];

pub fn well_known_label(imp: &str) -> Option<&'static str> {
    WELL_KNOWN_PROTOS
        .iter()
        .find(|(known, _)| *known == imp)
        .map(|(_, label)| *label)
}
