use eframe::egui::Color32;

const CLUSTER_PALETTE: [Color32; 10] = [
    Color32::from_rgb(86, 156, 214),
    Color32::from_rgb(230, 126, 84),
    Color32::from_rgb(120, 196, 120),
    Color32::from_rgb(214, 92, 140),
    Color32::from_rgb(238, 196, 88),
    Color32::from_rgb(150, 118, 220),
    Color32::from_rgb(72, 190, 190),
    Color32::from_rgb(196, 150, 102),
    Color32::from_rgb(160, 200, 64),
    Color32::from_rgb(232, 110, 96),
];

pub const UNGROUPED_COLOR: Color32 = Color32::from_rgb(140, 148, 160);

/// Canonical colour of a facet group; nodes without a group share a neutral grey.
pub fn cluster_color(group: Option<usize>) -> Color32 {
    match group {
        Some(index) => CLUSTER_PALETTE[index % CLUSTER_PALETTE.len()],
        None => UNGROUPED_COLOR,
    }
}

pub fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)).round() as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)).round() as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)).round() as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)).round() as u8,
    )
}

/// Colour for an edge between two groups: the group colour when shared, else the RGB midpoint.
pub fn connection_color(source_group: Option<usize>, target_group: Option<usize>) -> Color32 {
    if source_group == target_group {
        return cluster_color(source_group);
    }
    blend_color(cluster_color(source_group), cluster_color(target_group), 0.5)
}

pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}
