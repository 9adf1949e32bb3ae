//! Derive the origin set and partition rows by origin.

use std::collections::HashMap;

use tracing::warn;

use crate::coordinate::{parse_lon_lat, Coord};
use crate::error::Error;
use crate::table::{RowId, RowTable};

/// A named origin with its parsed coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub name: String,
    pub coord: Coord,
}

/// All rows belonging to one origin, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginGroup {
    pub origin: Origin,
    pub row_ids: Vec<RowId>,
    pub destinations: Vec<Coord>,
}

impl OriginGroup {
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }
}

/// Group rows by origin name, origins in first-seen order.
///
/// The first coordinate field seen for a name is the one used. Later rows
/// carrying a different field for the same name are grouped under the first
/// coordinate and reported with a warning. Any origin field that fails to
/// parse aborts the whole grouping.
pub fn group_by_origin(table: &RowTable) -> Result<Vec<OriginGroup>, Error> {
    let mut groups: Vec<OriginGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in table.rows() {
        let slot = match index.get(row.origin_name.as_str()) {
            Some(&slot) => {
                let first_field = table
                    .get(groups[slot].row_ids[0])
                    .map(|first| first.origin_coord_field.as_str());
                if first_field != Some(row.origin_coord_field.as_str()) {
                    // Still parse it: a broken field is an error even when shadowed.
                    let conflicting = parse_lon_lat(&row.origin_coord_field)?;
                    if conflicting != groups[slot].origin.coord {
                        warn!(
                            origin = %row.origin_name,
                            row = row.id.0,
                            kept = ?groups[slot].origin.coord,
                            ignored = ?conflicting,
                            "origin has conflicting coordinates; keeping the first"
                        );
                    }
                }
                slot
            }
            None => {
                let coord = parse_lon_lat(&row.origin_coord_field)?;
                groups.push(OriginGroup {
                    origin: Origin {
                        name: row.origin_name.clone(),
                        coord,
                    },
                    row_ids: Vec::new(),
                    destinations: Vec::new(),
                });
                index.insert(row.origin_name.as_str(), groups.len() - 1);
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        group.row_ids.push(row.id);
        group.destinations.push(row.destination);
    }

    Ok(groups)
}

/// `origin_name -> coordinate` view of grouped origins.
pub fn origin_map(groups: &[OriginGroup]) -> HashMap<String, Coord> {
    groups
        .iter()
        .map(|group| (group.origin.name.clone(), group.origin.coord))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn row(origin: &str, field: &str, lon: f64, lat: f64) -> Row {
        Row {
            id: RowId(0),
            origin_name: origin.to_string(),
            origin_coord_field: field.to_string(),
            destination: Coord::new(lon, lat),
            label: format!("{}-{}", lon, lat),
            distance_km: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let table = RowTable::new(
            Vec::new(),
            vec![
                row("B", "1|1", 10.0, 10.0),
                row("A", "2|2", 20.0, 20.0),
                row("B", "1|1", 11.0, 11.0),
                row("A", "2|2", 21.0, 21.0),
                row("B", "1|1", 12.0, 12.0),
            ],
        );

        let groups = group_by_origin(&table).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].origin.name, "B");
        assert_eq!(groups[0].row_ids, vec![RowId(0), RowId(2), RowId(4)]);
        assert_eq!(
            groups[0].destinations,
            vec![Coord::new(10.0, 10.0), Coord::new(11.0, 11.0), Coord::new(12.0, 12.0)]
        );
        assert_eq!(groups[1].origin.name, "A");
        assert_eq!(groups[1].origin.coord, Coord::new(2.0, 2.0));
        assert_eq!(groups[1].row_ids, vec![RowId(1), RowId(3)]);
    }

    #[test]
    fn test_first_coordinate_wins_on_conflict() {
        let table = RowTable::new(
            Vec::new(),
            vec![row("A", "9,70|48,48", 1.0, 1.0), row("A", "5.0|5.0", 2.0, 2.0)],
        );

        let groups = group_by_origin(&table).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].origin.coord, Coord::new(9.70, 48.48));
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_equivalent_fields_do_not_conflict() {
        let table = RowTable::new(
            Vec::new(),
            vec![row("A", "9,70|48,48", 1.0, 1.0), row("A", "9.70|48.48", 2.0, 2.0)],
        );
        let groups = group_by_origin(&table).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_malformed_origin_fails_whole_grouping() {
        let table = RowTable::new(
            Vec::new(),
            vec![row("A", "1|1", 1.0, 1.0), row("B", "not-a-coordinate", 2.0, 2.0)],
        );
        let err = group_by_origin(&table).unwrap_err();
        assert!(matches!(err, Error::MalformedCoordinate { .. }));
    }

    #[test]
    fn test_malformed_conflicting_field_fails_grouping() {
        let table = RowTable::new(
            Vec::new(),
            vec![row("A", "1|1", 1.0, 1.0), row("A", "broken", 2.0, 2.0)],
        );
        let err = group_by_origin(&table).unwrap_err();
        assert!(matches!(err, Error::MalformedCoordinate { .. }));
    }

    #[test]
    fn test_differently_written_equal_field_is_accepted() {
        let table = RowTable::new(
            Vec::new(),
            vec![row("A", "1|1", 1.0, 1.0), row("A", "1,0|1", 2.0, 2.0)],
        );
        let groups = group_by_origin(&table).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].origin.coord, Coord::new(1.0, 1.0));
        assert_eq!(groups[0].row_ids, vec![RowId(0), RowId(1)]);
    }

    #[test]
    fn test_origin_map() {
        let table = RowTable::new(Vec::new(), vec![row("A", "1|2", 0.0, 0.0)]);
        let groups = group_by_origin(&table).unwrap();
        let map = origin_map(&groups);
        assert_eq!(map.get("A"), Some(&Coord::new(1.0, 2.0)));
    }

    #[test]
    fn test_empty_table_has_no_groups() {
        let groups = group_by_origin(&RowTable::default()).unwrap();
        assert!(groups.is_empty());
    }
}
