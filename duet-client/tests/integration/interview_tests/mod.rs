mod test_exit;
