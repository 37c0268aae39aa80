use agwa_join_core::inspect::JOIN_TABLE_COLUMNS;
use agwa_join_core::JoinRecord;
use std::io::Write;

/// Write the existing joins table as CSV. The header is written even when
/// there are no joins.
pub fn write_joins<W: Write>(out: W, joins: &[JoinRecord]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if joins.is_empty() {
        writer.write_record(JOIN_TABLE_COLUMNS)?;
    }
    for record in joins {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_still_has_header() {
        let mut out = Vec::new();
        write_joins(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Layer,Database,Table,Simulation Name\n"
        );
    }

    #[test]
    fn test_rows_follow_serialized_header() {
        let joins = vec![JoinRecord {
            layer_name: "ws1_elements".to_string(),
            results_database: "/sims/sim_B/sim_B_results.gdb".to_string(),
            joined_table: "results_k2".to_string(),
            simulation_name: "sim_B".to_string(),
        }];
        let mut out = Vec::new();
        write_joins(&mut out, &joins).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Layer,Database,Table,Simulation Name\n\
             ws1_elements,/sims/sim_B/sim_B_results.gdb,results_k2,sim_B\n"
        );
    }
}
