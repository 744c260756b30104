// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! SQLite persistence for the channel graph.
//!
//! The database is the authoritative copy across restarts; the in-memory
//! cache in [`crate::graph::GraphStore`] is rebuilt from it on open. Node ids
//! and short channel ids are stored as lower-hex text, amounts as integers.

use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, Connection, Transaction};

use crate::graph::channel_info::{ChannelInfo, NodeInfo, PeerAddress, Policy};
use crate::types::{NodeId, ShortChannelId};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS node_info (
	node_id TEXT PRIMARY KEY,
	features INTEGER NOT NULL,
	timestamp INTEGER NOT NULL,
	alias TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS channel_info (
	short_channel_id TEXT PRIMARY KEY,
	node1_id TEXT NOT NULL REFERENCES node_info(node_id),
	node2_id TEXT NOT NULL REFERENCES node_info(node_id),
	capacity_sat INTEGER,
	msg_payload BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS policy (
	short_channel_id TEXT NOT NULL REFERENCES channel_info(short_channel_id) ON DELETE CASCADE,
	start_node TEXT NOT NULL,
	cltv_expiry_delta INTEGER NOT NULL,
	htlc_minimum_msat INTEGER NOT NULL,
	htlc_maximum_msat INTEGER,
	fee_base_msat INTEGER NOT NULL,
	fee_proportional_millionths INTEGER NOT NULL,
	channel_flags INTEGER NOT NULL,
	timestamp INTEGER NOT NULL,
	PRIMARY KEY (short_channel_id, start_node)
);

CREATE TABLE IF NOT EXISTS address (
	node_id TEXT NOT NULL REFERENCES node_info(node_id) ON DELETE CASCADE,
	host TEXT NOT NULL,
	port INTEGER NOT NULL,
	last_connected_at INTEGER NOT NULL,
	PRIMARY KEY (node_id, host, port)
);
";

pub(crate) fn open_database(path: &Path) -> rusqlite::Result<Connection> {
	let conn = Connection::open(path)?;
	conn.execute_batch(SCHEMA)?;
	Ok(conn)
}

fn scid_text(scid: ShortChannelId) -> String {
	format!("{:016x}", scid.as_u64())
}

fn scid_from_text(idx: usize, text: &str) -> rusqlite::Result<ShortChannelId> {
	u64::from_str_radix(text, 16)
		.map(ShortChannelId::new)
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn node_id_from_text(idx: usize, text: &str) -> rusqlite::Result<NodeId> {
	NodeId::from_str(text)
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn insert_shell_node_if_absent(
	conn: &Connection, node_id: &NodeId,
) -> rusqlite::Result<()> {
	conn.execute(
		"INSERT OR IGNORE INTO node_info (node_id, features, timestamp, alias) VALUES (?1, 0, 0, '')",
		params![node_id.to_string()],
	)?;
	Ok(())
}

/// Replaces the node record and its address list, keeping the row in place so
/// channel references stay valid.
pub(crate) fn replace_node(
	tx: &Transaction, node: &NodeInfo, addresses: &[(String, u16)],
) -> rusqlite::Result<()> {
	tx.execute(
		"INSERT INTO node_info (node_id, features, timestamp, alias) VALUES (?1, ?2, ?3, ?4)
		 ON CONFLICT(node_id) DO UPDATE SET features = ?2, timestamp = ?3, alias = ?4",
		params![node.node_id.to_string(), node.features as i64, node.timestamp, node.alias],
	)?;
	tx.execute("DELETE FROM address WHERE node_id = ?1", params![node.node_id.to_string()])?;
	for (host, port) in addresses {
		tx.execute(
			"INSERT OR IGNORE INTO address (node_id, host, port, last_connected_at) VALUES (?1, ?2, ?3, 0)",
			params![node.node_id.to_string(), host, port],
		)?;
	}
	Ok(())
}

/// Inserts a channel and shell records for any unknown endpoint.
pub(crate) fn insert_channel(tx: &Transaction, channel: &ChannelInfo) -> rusqlite::Result<()> {
	insert_shell_node_if_absent(tx, &channel.node1_id)?;
	insert_shell_node_if_absent(tx, &channel.node2_id)?;
	tx.execute(
		"INSERT INTO channel_info (short_channel_id, node1_id, node2_id, capacity_sat, msg_payload)
		 VALUES (?1, ?2, ?3, ?4, ?5)",
		params![
			scid_text(channel.short_channel_id),
			channel.node1_id.to_string(),
			channel.node2_id.to_string(),
			channel.capacity_sat.map(|c| c as i64),
			channel.announcement,
		],
	)?;
	Ok(())
}

pub(crate) fn delete_channel(conn: &Connection, scid: ShortChannelId) -> rusqlite::Result<()> {
	conn.execute("DELETE FROM channel_info WHERE short_channel_id = ?1", params![scid_text(scid)])?;
	Ok(())
}

pub(crate) fn upsert_policy(conn: &Connection, policy: &Policy) -> rusqlite::Result<()> {
	conn.execute(
		"INSERT INTO policy (short_channel_id, start_node, cltv_expiry_delta, htlc_minimum_msat,
		                     htlc_maximum_msat, fee_base_msat, fee_proportional_millionths,
		                     channel_flags, timestamp)
		 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
		 ON CONFLICT(short_channel_id, start_node) DO UPDATE SET
		     cltv_expiry_delta = ?3, htlc_minimum_msat = ?4, htlc_maximum_msat = ?5,
		     fee_base_msat = ?6, fee_proportional_millionths = ?7, channel_flags = ?8,
		     timestamp = ?9",
		params![
			scid_text(policy.short_channel_id),
			policy.start_node.to_string(),
			policy.cltv_expiry_delta,
			policy.htlc_minimum_msat as i64,
			policy.htlc_maximum_msat.map(|m| m as i64),
			policy.fee_base_msat,
			policy.fee_proportional_millionths,
			policy.channel_flags,
			policy.timestamp,
		],
	)?;
	Ok(())
}

pub(crate) fn upsert_address(conn: &Connection, address: &PeerAddress) -> rusqlite::Result<()> {
	insert_shell_node_if_absent(conn, &address.node_id)?;
	conn.execute(
		"INSERT INTO address (node_id, host, port, last_connected_at) VALUES (?1, ?2, ?3, ?4)
		 ON CONFLICT(node_id, host, port) DO UPDATE SET last_connected_at = ?4",
		params![
			address.node_id.to_string(),
			address.host,
			address.port,
			address.last_connected_at as i64,
		],
	)?;
	Ok(())
}

pub(crate) fn delete_address(
	conn: &Connection, node_id: &NodeId, host: &str, port: u16,
) -> rusqlite::Result<()> {
	conn.execute(
		"DELETE FROM address WHERE node_id = ?1 AND host = ?2 AND port = ?3",
		params![node_id.to_string(), host, port],
	)?;
	Ok(())
}

pub(crate) fn load_nodes(conn: &Connection) -> rusqlite::Result<Vec<NodeInfo>> {
	let mut stmt = conn.prepare("SELECT node_id, features, timestamp, alias FROM node_info")?;
	let rows = stmt.query_map([], |row| {
		Ok(NodeInfo {
			node_id: node_id_from_text(0, &row.get::<_, String>(0)?)?,
			features: row.get::<_, i64>(1)? as u64,
			timestamp: row.get(2)?,
			alias: row.get(3)?,
		})
	})?;
	rows.collect()
}

pub(crate) fn load_channels(conn: &Connection) -> rusqlite::Result<Vec<ChannelInfo>> {
	let mut stmt = conn.prepare(
		"SELECT short_channel_id, node1_id, node2_id, capacity_sat, msg_payload FROM channel_info",
	)?;
	let rows = stmt.query_map([], |row| {
		Ok(ChannelInfo {
			short_channel_id: scid_from_text(0, &row.get::<_, String>(0)?)?,
			node1_id: node_id_from_text(1, &row.get::<_, String>(1)?)?,
			node2_id: node_id_from_text(2, &row.get::<_, String>(2)?)?,
			capacity_sat: row.get::<_, Option<i64>>(3)?.map(|c| c as u64),
			announcement: row.get(4)?,
		})
	})?;
	rows.collect()
}

pub(crate) fn load_policies(conn: &Connection) -> rusqlite::Result<Vec<Policy>> {
	let mut stmt = conn.prepare(
		"SELECT short_channel_id, start_node, cltv_expiry_delta, htlc_minimum_msat,
		        htlc_maximum_msat, fee_base_msat, fee_proportional_millionths, channel_flags,
		        timestamp
		 FROM policy",
	)?;
	let rows = stmt.query_map([], |row| {
		Ok(Policy {
			short_channel_id: scid_from_text(0, &row.get::<_, String>(0)?)?,
			start_node: node_id_from_text(1, &row.get::<_, String>(1)?)?,
			cltv_expiry_delta: row.get(2)?,
			htlc_minimum_msat: row.get::<_, i64>(3)? as u64,
			htlc_maximum_msat: row.get::<_, Option<i64>>(4)?.map(|m| m as u64),
			fee_base_msat: row.get(5)?,
			fee_proportional_millionths: row.get(6)?,
			channel_flags: row.get(7)?,
			timestamp: row.get(8)?,
		})
	})?;
	rows.collect()
}

pub(crate) fn load_addresses(conn: &Connection) -> rusqlite::Result<Vec<PeerAddress>> {
	let mut stmt =
		conn.prepare("SELECT node_id, host, port, last_connected_at FROM address")?;
	let rows = stmt.query_map([], |row| {
		Ok(PeerAddress {
			node_id: node_id_from_text(0, &row.get::<_, String>(0)?)?,
			host: row.get(1)?,
			port: row.get(2)?,
			last_connected_at: row.get::<_, i64>(3)? as u64,
		})
	})?;
	rows.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn count_rows(conn: &Connection, table: &str) -> usize {
		conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get::<_, i64>(0))
			.unwrap() as usize
	}

	fn node(byte: u8) -> NodeId {
		NodeId::from_array([byte; 33])
	}

	fn test_channel(scid: u64, node1: u8, node2: u8) -> ChannelInfo {
		ChannelInfo {
			short_channel_id: ShortChannelId::new(scid),
			node1_id: node(node1),
			node2_id: node(node2),
			capacity_sat: Some(100_000),
			announcement: vec![1, 2, 3],
		}
	}

	#[test]
	fn policy_delete_cascades_with_channel() {
		let mut conn = open_database(Path::new(":memory:")).unwrap();
		let tx = conn.transaction().unwrap();
		insert_channel(&tx, &test_channel(7, 2, 3)).unwrap();
		tx.commit().unwrap();

		upsert_policy(
			&conn,
			&Policy {
				short_channel_id: ShortChannelId::new(7),
				start_node: node(2),
				cltv_expiry_delta: 40,
				htlc_minimum_msat: 0,
				htlc_maximum_msat: None,
				fee_base_msat: 1000,
				fee_proportional_millionths: 0,
				channel_flags: 0,
				timestamp: 1,
			},
		)
		.unwrap();
		assert_eq!(count_rows(&conn, "policy"), 1);

		delete_channel(&conn, ShortChannelId::new(7)).unwrap();
		assert_eq!(count_rows(&conn, "channel_info"), 0);
		assert_eq!(count_rows(&conn, "policy"), 0);
	}

	#[test]
	fn policy_requires_existing_channel() {
		let conn = open_database(Path::new(":memory:")).unwrap();
		let result = upsert_policy(
			&conn,
			&Policy {
				short_channel_id: ShortChannelId::new(9),
				start_node: node(2),
				cltv_expiry_delta: 40,
				htlc_minimum_msat: 0,
				htlc_maximum_msat: None,
				fee_base_msat: 0,
				fee_proportional_millionths: 0,
				channel_flags: 0,
				timestamp: 1,
			},
		);
		assert!(result.is_err());
	}

	#[test]
	fn channel_round_trips_through_rows() {
		let mut conn = open_database(Path::new(":memory:")).unwrap();
		let channel = test_channel(0x123456789abcdef0, 2, 3);
		let tx = conn.transaction().unwrap();
		insert_channel(&tx, &channel).unwrap();
		tx.commit().unwrap();

		let loaded = load_channels(&conn).unwrap();
		assert_eq!(loaded, vec![channel]);
		// Shell endpoints were created alongside.
		assert_eq!(load_nodes(&conn).unwrap().len(), 2);
	}

	#[test]
	fn replace_node_keeps_channel_references() {
		let mut conn = open_database(Path::new(":memory:")).unwrap();
		let tx = conn.transaction().unwrap();
		insert_channel(&tx, &test_channel(7, 2, 3)).unwrap();
		tx.commit().unwrap();

		let announced = NodeInfo {
			node_id: node(2),
			features: 1,
			timestamp: 100,
			alias: "alice".to_string(),
		};
		let tx = conn.transaction().unwrap();
		replace_node(&tx, &announced, &[("10.0.0.1".to_string(), 9735)]).unwrap();
		tx.commit().unwrap();

		let nodes = load_nodes(&conn).unwrap();
		assert!(nodes.contains(&announced));
		assert_eq!(load_addresses(&conn).unwrap().len(), 1);
		assert_eq!(count_rows(&conn, "channel_info"), 1);
	}
}
