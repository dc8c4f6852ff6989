mod retention_tests;
