use slotmap::new_key_type;

// Strongly-typed handles into backend-owned resource storage
new_key_type! {
    pub struct TextureId;
    pub struct RenderTargetId;
    pub struct GeometryId;
}
