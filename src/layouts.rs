binary_layout::binary_layout!(enttec_message_layout, LittleEndian, {
    start_delimiter: u8,
    label: u8,
    data_length: u16,
    data_and_end_delimiter: [u8],
});
