mod bulk_test;
mod clustering_test;
mod config_test;
mod simhash_index_test;
mod string_index_test;
mod tokenize_test;
