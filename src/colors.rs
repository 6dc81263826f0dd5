/// Color assignment for tasks. Colors are persisted once assigned so reports stay stable.
use std::collections::HashSet;

use tracing::debug;

use crate::domain::{Task, TaskId, for_each_mut, walk};

/// Fixed palette handed out in order before falling back to generated hues.
pub const PALETTE: [&str; 30] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#8dd3c7", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69",
    "#fccde5", "#bc80bd", "#ccebc5", "#ffed6f", "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c",
    "#fb9a99", "#e31a1c", "#fdbf6f", "#ff7f00", "#cab2d6", "#6a3d9a",
];

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_7;
const GENERATED_SATURATION: f64 = 0.65;
const GENERATED_VALUE: f64 = 0.92;

/// Validate if a string is a hex color of the form `#rrggbb`.
pub fn is_valid_hex(s: &str) -> bool {
    s.starts_with('#') && s.len() == 7 && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn parse_hex(s: &str) -> Option<(u8, u8, u8)> {
    if !is_valid_hex(s) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&s[range], 16).ok();
    Some((channel(1..3)?, channel(3..5)?, channel(5..7)?))
}

/// First palette color not in `used`, then golden-ratio hues.
pub fn next_color(used: &HashSet<String>) -> String {
    if let Some(color) = PALETTE.iter().find(|color| !used.contains(**color)) {
        return (*color).to_string();
    }

    let mut index = used.len() + 1;
    loop {
        let color = generated_color(index);
        if !used.contains(&color) {
            return color;
        }
        index += 1;
    }
}

pub fn generated_color(index: usize) -> String {
    let hue = (index as f64 * GOLDEN_RATIO_CONJUGATE).fract();
    let (r, g, b) = hsv_to_rgb(hue, GENERATED_SATURATION, GENERATED_VALUE);
    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Gives every task without a valid, unshared color the next free one, in
/// pre-order. The first holder of a duplicated color keeps it. Returns how many
/// tasks were assigned.
pub fn assign_colors(forest: &mut [Task]) -> usize {
    let mut used = HashSet::new();
    let mut needs_color: HashSet<TaskId> = HashSet::new();
    for task in walk(forest) {
        match task.color.as_deref().filter(|color| is_valid_hex(color)) {
            Some(color) if used.insert(color.to_ascii_lowercase()) => {}
            _ => {
                needs_color.insert(task.id.clone());
            }
        }
    }

    let mut assigned = 0;
    for_each_mut(forest, &mut |task: &mut Task| {
        if needs_color.contains(&task.id) {
            let color = next_color(&used);
            debug!(task = %task.name, %color, "assigned task color");
            used.insert(color.clone());
            task.color = Some(color);
            assigned += 1;
        }
    });
    assigned
}

/// Whether `color` is already held by a task other than `except_id`.
pub fn color_in_use(forest: &[Task], color: &str, except_id: &str) -> bool {
    walk(forest).any(|task| {
        task.id != except_id
            && task
                .color
                .as_deref()
                .is_some_and(|existing| existing.eq_ignore_ascii_case(color))
    })
}
