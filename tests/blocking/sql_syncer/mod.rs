mod test_bootstrap;
mod test_oplog_helper;
mod test_pg_store;
mod test_syncer;
