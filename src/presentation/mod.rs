pub mod device_list;
