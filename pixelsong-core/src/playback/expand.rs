//! Column expansion: one grid column into per-voice note groups

use crate::types::{note_for_row, Grid, Palette, PitchName, VoiceSpec, BACKGROUND};

/// Notes one voice plays together in a single column
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceGroup<'a> {
    pub voice: &'a VoiceSpec,
    pub notes: Vec<PitchName>,
}

/// Expand `column` of `grid` into note groups, one per voice.
///
/// Background cells are skipped. Groups appear in the order their voice is
/// first met scanning from the top row down; notes within a group keep row
/// order (highest first).
pub fn expand_column<'a>(grid: &Grid, palette: &'a Palette, column: usize) -> Vec<VoiceGroup<'a>> {
    let mut groups: Vec<VoiceGroup<'a>> = Vec::new();

    for (row, color) in grid.column(column) {
        if color == BACKGROUND {
            continue;
        }
        let voice = palette.resolve(color);
        let note = note_for_row(row);
        match groups.iter_mut().find(|g| g.voice.id == voice.id) {
            Some(group) => group.notes.push(note),
            None => groups.push(VoiceGroup {
                voice,
                notes: vec![note],
            }),
        }
    }

    groups
}
