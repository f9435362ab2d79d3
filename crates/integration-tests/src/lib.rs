// Integration tests live in tests/; see that directory.
