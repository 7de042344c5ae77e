mod sql_syncer;
